//! Persisted media file, catalog track and detection records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Processing status of an uploaded media file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaFileStatus {
    /// Registered, or identified and awaiting review
    NotFinished,
    /// Identification running
    Processing,
    /// Reviewed and closed
    Finished,
    /// Identification failed
    Error,
}

impl MediaFileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFileStatus::NotFinished => "not_finished",
            MediaFileStatus::Processing => "processing",
            MediaFileStatus::Finished => "finished",
            MediaFileStatus::Error => "error",
        }
    }
}

impl fmt::Display for MediaFileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaFileStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "not_finished" => Ok(MediaFileStatus::NotFinished),
            "processing" => Ok(MediaFileStatus::Processing),
            "finished" => Ok(MediaFileStatus::Finished),
            "error" => Ok(MediaFileStatus::Error),
            other => Err(format!("Unknown media file status: {}", other)),
        }
    }
}

/// Registration request for a media file
#[derive(Debug, Clone, Deserialize)]
pub struct NewMediaFile {
    pub original_name: String,
    #[serde(default)]
    pub size_bytes: Option<i64>,
    #[serde(default)]
    pub format: Option<String>,
}

/// Media file record
#[derive(Debug, Clone, Serialize)]
pub struct MediaFile {
    pub id: i64,
    pub original_name: String,
    pub size_bytes: Option<i64>,
    pub format: Option<String>,
    pub status: MediaFileStatus,
    pub duration_seconds: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Catalog entry for an identified work
#[derive(Debug, Clone, Serialize)]
pub struct CatalogTrack {
    pub id: i64,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub label: Option<String>,
    pub genre: Option<String>,
    pub isrc: Option<String>,
}

/// Detection of a catalog track inside a media file
#[derive(Debug, Clone, Serialize)]
pub struct StoredDetection {
    pub id: i64,
    pub media_file_id: i64,
    pub track_id: i64,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub isrc: Option<String>,
}

/// Identifiers produced by saving one consolidated track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SavedDetection {
    pub track_id: i64,
    pub detection_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            MediaFileStatus::NotFinished,
            MediaFileStatus::Processing,
            MediaFileStatus::Finished,
            MediaFileStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<MediaFileStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_status_parse_accepts_loose_spelling() {
        assert_eq!("Not Finished".parse::<MediaFileStatus>(), Ok(MediaFileStatus::NotFinished));
        assert_eq!("not-finished".parse::<MediaFileStatus>(), Ok(MediaFileStatus::NotFinished));
        assert!("done".parse::<MediaFileStatus>().is_err());
    }
}
