//! AudD recognition client
//!
//! Sends one segment per call as a multipart upload (`api_token`, `return`,
//! `file`) and classifies the JSON answer. The client never fails towards
//! the pipeline: transport, authentication and decoding problems all become
//! an error [`RecognitionAnswer`] so the remaining segments keep going.

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use serde_json::Value;
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;

use crate::config::IdentifySettings;
use crate::models::{RecognitionAnswer, RecognitionStatus, RecognizerParams, Segment};

const USER_AGENT: &str = concat!("tracklog-id/", env!("CARGO_PKG_VERSION"));

/// Recognition client errors
///
/// Only surface inside the client; callers receive them as error answers.
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("Missing recognition API token")]
    MissingCredential,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Failed to read segment: {0}")]
    Io(#[from] std::io::Error),
}

/// Something that can identify the music in a segment
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Identify one segment; failures are reported as error answers
    async fn identify(&self, segment: &Segment) -> RecognitionAnswer;

    /// Request parameters echoed in reports
    fn params(&self) -> RecognizerParams;
}

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// AudD HTTP client
pub struct AuddClient {
    http_client: reqwest::Client,
    endpoint: String,
    api_token: String,
    return_fields: String,
    rate_limiter: Option<DirectLimiter>,
}

impl AuddClient {
    pub fn new(api_token: String, settings: &IdentifySettings) -> Result<Self, RecognitionError> {
        if api_token.trim().is_empty() {
            return Err(RecognitionError::MissingCredential);
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| RecognitionError::Network(e.to_string()))?;

        let rate_limiter = settings
            .max_requests_per_second
            .and_then(NonZeroU32::new)
            .map(|per_second| RateLimiter::direct(Quota::per_second(per_second)));

        Ok(Self {
            http_client,
            endpoint: settings.audd_endpoint.clone(),
            api_token,
            return_fields: settings.audd_return.clone(),
            rate_limiter,
        })
    }

    async fn send(&self, segment: &Segment) -> Result<Value, RecognitionError> {
        let bytes = tokio::fs::read(&segment.path).await?;

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(segment.file_name())
            .mime_str("audio/wav")
            .map_err(|e| RecognitionError::Network(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .text("api_token", self.api_token.clone())
            .text("return", self.return_fields.clone())
            .part("file", part);

        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        tracing::debug!(
            segment_index = segment.index,
            segment = %segment.file_name(),
            "Querying AudD"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| RecognitionError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RecognitionError::Api(status.as_u16(), error_text));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| RecognitionError::Parse(e.to_string()))
    }
}

#[async_trait]
impl Recognizer for AuddClient {
    async fn identify(&self, segment: &Segment) -> RecognitionAnswer {
        let answer = match self.send(segment).await {
            Ok(payload) => RecognitionAnswer::from_payload(segment.index, payload),
            Err(e) => RecognitionAnswer::error(segment.index, e.to_string()),
        };

        match answer.status {
            RecognitionStatus::SuccessMatch => tracing::info!(
                segment_index = segment.index,
                title = matched_title(&answer),
                "Segment recognized"
            ),
            RecognitionStatus::SuccessNoMatch => {
                tracing::debug!(segment_index = segment.index, "No match for segment")
            }
            RecognitionStatus::Error => tracing::warn!(
                segment_index = segment.index,
                error = answer.error_message().unwrap_or("unknown"),
                "Recognition call failed"
            ),
        }

        answer
    }

    fn params(&self) -> RecognizerParams {
        RecognizerParams {
            return_fields: self.return_fields.clone(),
        }
    }
}

/// Title of a matching answer, for logging
fn matched_title(answer: &RecognitionAnswer) -> &str {
    answer
        .result()
        .and_then(|r| r.get("title"))
        .and_then(Value::as_str)
        .unwrap_or("")
}
