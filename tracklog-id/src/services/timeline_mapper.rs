//! Segment-local match ranges to absolute timeline
//!
//! A matching answer can describe where the music sits inside its window in
//! several shapes:
//! 1. a `timecode` string `"MM:SS-MM:SS"` (one to three colon groups per side)
//! 2. a `timecodes` array of `{start, end}` objects or `"start-end"` strings
//! 3. neither, in which case an identified work (title, artist or album)
//!    gets one synthetic range of the default match length at the window start
//!
//! Shapes 1 and 2 both contribute when present. Every relative range is
//! shifted by `segment_index * window_seconds`.

use serde_json::Value;
use tracklog_common::timecode::{parse_timecode, parse_timecode_range};

use crate::models::{DetectionEntry, RecognitionAnswer};

/// Keys marking a payload object as describing an identified work
const IDENTIFICATION_KEYS: [&str; 4] = ["title", "artist", "album", "isrc"];

/// Converts recognition answers into absolute detections
#[derive(Debug, Clone)]
pub struct TimelineMapper {
    window_seconds: u32,
    default_match_seconds: f64,
}

impl TimelineMapper {
    pub fn new(window_seconds: u32, default_match_seconds: f64) -> Self {
        Self {
            window_seconds,
            default_match_seconds,
        }
    }

    /// Offset of segment `index` on the absolute timeline
    pub fn segment_offset(&self, index: usize) -> f64 {
        index as f64 * self.window_seconds as f64
    }

    /// Detections of every answer, in segment order
    pub fn map_all(&self, answers: &[RecognitionAnswer]) -> Vec<DetectionEntry> {
        answers.iter().flat_map(|a| self.map_answer(a)).collect()
    }

    /// Detections of one answer; empty unless the answer is a match
    pub fn map_answer(&self, answer: &RecognitionAnswer) -> Vec<DetectionEntry> {
        let Some(result) = answer.result() else {
            return Vec::new();
        };

        let offset = self.segment_offset(answer.segment_index);
        let results: Vec<&Value> = match result {
            Value::Array(items) => items.iter().filter(|v| v.is_object()).collect(),
            other => vec![other],
        };

        let mut detections = Vec::new();
        for result in results {
            for (start, end, metadata) in self.relative_ranges(result) {
                detections.push(DetectionEntry {
                    segment_index: answer.segment_index,
                    start_seconds: start + offset,
                    end_seconds: end + offset,
                    metadata,
                });
            }
        }

        if detections.is_empty() {
            tracing::debug!(
                segment_index = answer.segment_index,
                "Match carried no usable range"
            );
        }
        detections
    }

    /// Relative `(start, end, metadata)` triples read from one result object
    fn relative_ranges(&self, result: &Value) -> Vec<(f64, f64, Value)> {
        let mut ranges = Vec::new();

        if let Some(timecode) = result.get("timecode").and_then(Value::as_str) {
            match parse_timecode_range(timecode) {
                Some((start, end)) => ranges.push((start, end, result.clone())),
                None => tracing::debug!(timecode, "Skipping unparseable timecode"),
            }
        }

        if let Some(entries) = result.get("timecodes").and_then(Value::as_array) {
            for entry in entries {
                match entry_range(entry) {
                    Some((start, end)) => {
                        let metadata = if carries_identification(entry) {
                            entry.clone()
                        } else {
                            result.clone()
                        };
                        ranges.push((start, end, metadata));
                    }
                    None => tracing::debug!(entry = %entry, "Skipping unparseable timecodes entry"),
                }
            }
        }

        if ranges.is_empty() && has_any(result, &["title", "artist", "album"]) {
            ranges.push((0.0, self.default_match_seconds, result.clone()));
        }

        ranges
    }
}

/// Range of one `timecodes` entry
fn entry_range(entry: &Value) -> Option<(f64, f64)> {
    match entry {
        Value::String(s) => parse_timecode_range(s),
        Value::Object(_) => {
            let start = seconds_value(entry.get("start")?)?;
            let end = seconds_value(entry.get("end")?)?;
            Some((start, end))
        }
        _ => None,
    }
}

/// Seconds from a number or a timecode string
fn seconds_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|s| s.is_finite() && *s >= 0.0),
        Value::String(s) => parse_timecode(s),
        _ => None,
    }
}

fn carries_identification(entry: &Value) -> bool {
    has_any(entry, &IDENTIFICATION_KEYS)
}

fn has_any(value: &Value, keys: &[&str]) -> bool {
    keys.iter().any(|key| match value.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    })
}
