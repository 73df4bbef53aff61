//! Identification report returned to the caller

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::RecognitionStatus;

/// Final catalog of one identification run
#[derive(Debug, Clone, Serialize)]
pub struct IdentificationReport {
    pub run_id: Uuid,
    /// Persistence record the run reported to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<FileRef>,
    /// Retained combined audio (only when enabled)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combined_path: Option<String>,
    pub segment_count: usize,
    pub window_seconds: u32,
    pub track_count: usize,
    pub tracks: Vec<TrackReport>,
    /// Raw answer per segment
    pub segments: Vec<SegmentAnswerSummary>,
    /// Diagnostic record per segment
    pub schedule: Vec<DiagnosticRecord>,
    pub recognizer: RecognizerParams,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileRef {
    pub id: i64,
}

/// One consolidated track as reported
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrackReport {
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub duration_seconds: f64,
    /// `"MM:SS"`
    pub start_timecode: String,
    /// `"MM:SS"`
    pub end_timecode: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub isrc: Option<String>,
    pub release_date: Option<String>,
    pub link: Option<String>,
}

/// Status and payload of one segment's recognition call
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SegmentAnswerSummary {
    pub index: usize,
    pub segment: String,
    pub status: RecognitionStatus,
    pub payload: Value,
}

/// Per-segment audit entry, not authoritative for the track list
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DiagnosticRecord {
    pub index: usize,
    pub segment: String,
    pub found: bool,
    pub start_seconds: f64,
    pub end_seconds: f64,
    /// Raw metadata of every detection read from this window
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<Value>,
}

/// Request parameters sent to the recognition service
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecognizerParams {
    #[serde(rename = "return")]
    pub return_fields: String,
}
