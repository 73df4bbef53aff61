//! Identification report assembly

use uuid::Uuid;

use tracklog_common::timecode::format_minutes_seconds;

use super::metadata_extractor::ProviderPayload;
use crate::models::{
    ConsolidatedTrack, DetectionEntry, DiagnosticRecord, FileRef, IdentificationReport,
    RecognitionAnswer, RecognizerParams, Segment, SegmentAnswerSummary, TrackReport,
};

/// Collects run-level facts, then renders the final report
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    run_id: Uuid,
    window_seconds: u32,
    recognizer: RecognizerParams,
    file: Option<FileRef>,
    combined_path: Option<String>,
}

impl ReportBuilder {
    pub fn new(run_id: Uuid, window_seconds: u32, recognizer: RecognizerParams) -> Self {
        Self {
            run_id,
            window_seconds,
            recognizer,
            file: None,
            combined_path: None,
        }
    }

    pub fn with_file(mut self, file_id: Option<i64>) -> Self {
        self.file = file_id.map(|id| FileRef { id });
        self
    }

    pub fn with_combined_path(mut self, path: Option<String>) -> Self {
        self.combined_path = path;
        self
    }

    pub fn build(
        self,
        segments: &[Segment],
        answers: &[RecognitionAnswer],
        detections: &[DetectionEntry],
        tracks: &[ConsolidatedTrack],
    ) -> IdentificationReport {
        let tracks: Vec<TrackReport> = tracks.iter().map(track_report).collect();

        IdentificationReport {
            run_id: self.run_id,
            file: self.file,
            combined_path: self.combined_path,
            segment_count: segments.len(),
            window_seconds: self.window_seconds,
            track_count: tracks.len(),
            tracks,
            segments: summarize_answers(segments, answers),
            schedule: build_schedule(segments, detections),
            recognizer: self.recognizer,
        }
    }
}

/// Report entry for one consolidated track
pub fn track_report(track: &ConsolidatedTrack) -> TrackReport {
    let link = track
        .source_metadata
        .as_ref()
        .and_then(|meta| ProviderPayload::from_value(meta).link());

    TrackReport {
        start_seconds: track.start_seconds,
        end_seconds: track.end_seconds,
        duration_seconds: track.duration_seconds(),
        start_timecode: format_minutes_seconds(track.start_seconds),
        end_timecode: format_minutes_seconds(track.end_seconds),
        title: track.title.clone(),
        artist: track.artist.clone(),
        isrc: track.isrc.clone(),
        release_date: track.release_date.clone(),
        link,
    }
}

/// One diagnostic record per segment
///
/// A segment is "found" when at least one detection was read from it.
pub fn build_schedule(segments: &[Segment], detections: &[DetectionEntry]) -> Vec<DiagnosticRecord> {
    segments
        .iter()
        .map(|segment| {
            let metadata: Vec<_> = detections
                .iter()
                .filter(|d| d.segment_index == segment.index)
                .map(|d| d.metadata.clone())
                .collect();

            DiagnosticRecord {
                index: segment.index,
                segment: segment.file_name(),
                found: !metadata.is_empty(),
                start_seconds: segment.start_offset_seconds,
                end_seconds: segment.end_seconds(),
                metadata,
            }
        })
        .collect()
}

/// Status and raw payload of each segment's answer, in segment order
pub fn summarize_answers(
    segments: &[Segment],
    answers: &[RecognitionAnswer],
) -> Vec<SegmentAnswerSummary> {
    answers
        .iter()
        .map(|answer| SegmentAnswerSummary {
            index: answer.segment_index,
            segment: segments
                .get(answer.segment_index)
                .map(Segment::file_name)
                .unwrap_or_default(),
            status: answer.status,
            payload: answer.raw_payload.clone(),
        })
        .collect()
}
