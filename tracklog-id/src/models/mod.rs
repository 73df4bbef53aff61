//! Data models for tracklog-id
//!
//! Pipeline entities (segments, answers, detections, tracks, reports) are
//! created fresh for each identification run and dropped once the report is
//! built. Media file and catalog records mirror the persisted tables.

pub mod media_file;
pub mod recognition;
pub mod report;
pub mod segment;
pub mod track;

pub use media_file::{CatalogTrack, MediaFile, MediaFileStatus, NewMediaFile, SavedDetection, StoredDetection};
pub use recognition::{DetectionEntry, RecognitionAnswer, RecognitionStatus};
pub use report::{DiagnosticRecord, FileRef, IdentificationReport, RecognizerParams, SegmentAnswerSummary, TrackReport};
pub use segment::Segment;
pub use track::ConsolidatedTrack;
