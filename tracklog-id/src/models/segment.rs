//! Fixed-duration audio window

use serde::Serialize;
use std::path::PathBuf;

/// One window of the normalized audio stream
///
/// Segments are contiguous and non-overlapping, indices are dense from 0,
/// and only the final segment may be shorter than the window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    /// Position in the ordered segment list
    pub index: usize,
    /// Segment file inside the run's scratch space
    pub path: PathBuf,
    /// `index * window_seconds`
    pub start_offset_seconds: f64,
    /// Actual duration of the segment file
    pub duration_seconds: f64,
}

impl Segment {
    pub fn new(index: usize, path: PathBuf, window_seconds: u32, duration_seconds: f64) -> Self {
        Self {
            index,
            path,
            start_offset_seconds: index as f64 * window_seconds as f64,
            duration_seconds,
        }
    }

    /// Absolute end position in seconds
    pub fn end_seconds(&self) -> f64 {
        self.start_offset_seconds + self.duration_seconds
    }

    /// File name used in reports (scratch paths are meaningless once the run ends)
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("segment-{:03}", self.index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_derived_from_index() {
        let segment = Segment::new(3, PathBuf::from("/tmp/run/segment-003.wav"), 20, 12.5);
        assert_eq!(segment.start_offset_seconds, 60.0);
        assert_eq!(segment.end_seconds(), 72.5);
        assert_eq!(segment.file_name(), "segment-003.wav");
    }
}
