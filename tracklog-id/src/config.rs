//! Configuration resolution for tracklog-id
//!
//! The AudD token resolves Environment → TOML. Pipeline settings come from
//! the `[identify]` TOML table with built-in defaults, and a few values can
//! be overridden from the environment.

use serde::Deserialize;
use std::path::PathBuf;
use tracing::{info, warn};
use tracklog_common::config::TomlConfig;
use tracklog_common::{Error, Result};

/// Environment variable holding the AudD API token
pub const AUDD_TOKEN_ENV: &str = "TRACKLOG_AUDD_TOKEN";

/// Environment variable overriding `default_match_seconds`
pub const DEFAULT_MATCH_SECONDS_ENV: &str = "TRACKLOG_DEFAULT_MATCH_SECONDS";

/// Pipeline settings (`[identify]` table)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdentifySettings {
    /// Window length in seconds
    pub window_seconds: u32,
    /// Recognition calls allowed in flight at once
    pub max_concurrent_recognitions: usize,
    /// Span given to a match that reports no timecodes
    pub default_match_seconds: f64,
    /// Recognition service endpoint
    pub audd_endpoint: String,
    /// Value of the `return` request field
    pub audd_return: String,
    /// Per-call HTTP timeout
    pub request_timeout_secs: u64,
    /// Client-side request rate limit (unset = unlimited)
    pub max_requests_per_second: Option<u32>,
    /// ffmpeg executable name or path
    pub ffmpeg_binary: String,
    /// Parent directory of per-run scratch directories
    pub scratch_dir: PathBuf,
    /// Keep a concatenated copy of the normalized audio under the root folder
    pub keep_combined_audio: bool,
    /// Upper bound for upload bodies
    pub max_upload_bytes: usize,
}

impl Default for IdentifySettings {
    fn default() -> Self {
        Self {
            window_seconds: 20,
            max_concurrent_recognitions: 2,
            default_match_seconds: 10.0,
            audd_endpoint: "https://api.audd.io/".to_string(),
            audd_return: "timecode,apple_music,deezer".to_string(),
            request_timeout_secs: 60,
            max_requests_per_second: None,
            ffmpeg_binary: "ffmpeg".to_string(),
            scratch_dir: std::env::temp_dir().join("tracklog-audio"),
            keep_combined_audio: false,
            max_upload_bytes: 1024 * 1024 * 1024,
        }
    }
}

impl IdentifySettings {
    /// Read settings from the `[identify]` table, then apply environment overrides
    pub fn from_toml(toml_config: &TomlConfig) -> Result<Self> {
        let mut settings: IdentifySettings = toml::Value::Table(toml_config.identify.clone())
            .try_into()
            .map_err(|e| Error::Config(format!("Invalid [identify] table: {}", e)))?;

        if let Ok(raw) = std::env::var(DEFAULT_MATCH_SECONDS_ENV) {
            settings.default_match_seconds = raw.trim().parse().map_err(|_| {
                Error::Config(format!(
                    "{} must be a number of seconds, got {:?}",
                    DEFAULT_MATCH_SECONDS_ENV, raw
                ))
            })?;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.window_seconds == 0 {
            return Err(Error::Config("window_seconds must be at least 1".to_string()));
        }
        if self.max_concurrent_recognitions == 0 {
            return Err(Error::Config(
                "max_concurrent_recognitions must be at least 1".to_string(),
            ));
        }
        if !(self.default_match_seconds.is_finite() && self.default_match_seconds > 0.0) {
            return Err(Error::Config(
                "default_match_seconds must be greater than 0".to_string(),
            ));
        }
        if self.max_requests_per_second == Some(0) {
            return Err(Error::Config(
                "max_requests_per_second must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolve the AudD API token
///
/// **Priority:** Environment → TOML. Missing everywhere is fatal: the
/// service cannot recognize anything without it.
pub fn resolve_audd_token(toml_config: &TomlConfig) -> Result<String> {
    let env_token = std::env::var(AUDD_TOKEN_ENV).ok().filter(|t| is_valid_token(t));
    let toml_token = toml_config
        .audd_api_token
        .clone()
        .filter(|t| is_valid_token(t));

    if env_token.is_some() && toml_token.is_some() {
        warn!("AudD token found in both environment and TOML. Using environment.");
    }

    if let Some(token) = env_token {
        info!("AudD token loaded from environment variable");
        return Ok(token.trim().to_string());
    }

    if let Some(token) = toml_token {
        info!("AudD token loaded from TOML config");
        return Ok(token.trim().to_string());
    }

    Err(Error::Config(format!(
        "AudD API token not configured. Set one of:\n\
         1. Environment: {}=your-token\n\
         2. TOML config: audd_api_token = \"your-token\"\n\
         \n\
         Obtain a token at: https://dashboard.audd.io/",
        AUDD_TOKEN_ENV
    )))
}

/// Token must be non-empty and not whitespace
pub fn is_valid_token(token: &str) -> bool {
    !token.trim().is_empty()
}
