//! Consolidated track on the absolute timeline

use serde::Serialize;
use serde_json::Value;

/// A musical work occupying `[start_seconds, end_seconds]` of the media
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidatedTrack {
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub isrc: Option<String>,
    pub release_date: Option<String>,
    /// Provider payload the track was first built from
    pub source_metadata: Option<Value>,
    /// Segment of the earliest contributing detection (sort tie-breaker)
    #[serde(skip)]
    pub first_segment: usize,
}

impl ConsolidatedTrack {
    pub fn duration_seconds(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }

    /// Whether `other` is the same recorded work
    ///
    /// Titles equal ignoring case, or ISRCs equal and non-empty.
    pub fn same_work(&self, other: &ConsolidatedTrack) -> bool {
        let same_title = match (&self.title, &other.title) {
            (Some(a), Some(b)) => a.to_lowercase() == b.to_lowercase(),
            _ => false,
        };
        let same_isrc = match (&self.isrc, &other.isrc) {
            (Some(a), Some(b)) => !a.is_empty() && a == b,
            _ => false,
        };
        same_title || same_isrc
    }

    /// Copy of `self` extended to cover `other`, with missing fields filled
    /// from `other`. Present values are never overwritten.
    pub fn absorb(&self, other: &ConsolidatedTrack) -> ConsolidatedTrack {
        ConsolidatedTrack {
            start_seconds: self.start_seconds,
            end_seconds: self.end_seconds.max(other.end_seconds),
            title: self.title.clone().or_else(|| other.title.clone()),
            artist: self.artist.clone().or_else(|| other.artist.clone()),
            isrc: self.isrc.clone().or_else(|| other.isrc.clone()),
            release_date: self.release_date.clone().or_else(|| other.release_date.clone()),
            source_metadata: self
                .source_metadata
                .clone()
                .or_else(|| other.source_metadata.clone()),
            first_segment: self.first_segment.min(other.first_segment),
        }
    }
}
