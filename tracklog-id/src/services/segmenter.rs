//! Fixed-window segmentation of normalized audio
//!
//! The transcoder cuts the normalized WAV into files; the segmenter turns
//! those files into [`Segment`]s, reading each file's real duration from its
//! WAV header and checking the layout against [`plan_windows`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::transcoder::{TranscodeError, Transcoder, OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE};
use crate::models::Segment;

/// Tolerance when comparing measured durations against the window plan
const DURATION_TOLERANCE_SECONDS: f64 = 0.5;

/// Expected window of a `total_seconds` stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowPlan {
    pub index: usize,
    pub start_seconds: f64,
    pub duration_seconds: f64,
}

/// Lay out `ceil(total / window)` contiguous windows covering `total_seconds`
///
/// Every window but the last is exactly `window_seconds` long; durations sum
/// to `total_seconds`. A non-positive total yields no windows.
pub fn plan_windows(total_seconds: f64, window_seconds: u32) -> Vec<WindowPlan> {
    if !(total_seconds.is_finite() && total_seconds > 0.0) || window_seconds == 0 {
        return Vec::new();
    }

    let window = window_seconds as f64;
    let count = (total_seconds / window).ceil() as usize;
    (0..count)
        .map(|index| {
            let start_seconds = index as f64 * window;
            WindowPlan {
                index,
                start_seconds,
                duration_seconds: (total_seconds - start_seconds).min(window),
            }
        })
        .collect()
}

/// Splits normalized audio into ordered segments
pub struct Segmenter {
    transcoder: Arc<dyn Transcoder>,
    window_seconds: u32,
}

impl Segmenter {
    pub fn new(transcoder: Arc<dyn Transcoder>, window_seconds: u32) -> Self {
        Self {
            transcoder,
            window_seconds,
        }
    }

    pub fn window_seconds(&self) -> u32 {
        self.window_seconds
    }

    /// Cut `wav` into segments inside `work_dir`
    pub async fn split(&self, wav: &Path, work_dir: &Path) -> Result<Vec<Segment>, TranscodeError> {
        let paths = self
            .transcoder
            .segment(wav, self.window_seconds, work_dir)
            .await?;

        let mut segments = Vec::with_capacity(paths.len());
        for (index, path) in paths.into_iter().enumerate() {
            let duration = wav_duration_seconds(&path).await?;
            segments.push(Segment::new(index, path, self.window_seconds, duration));
        }

        self.check_layout(&segments);
        Ok(segments)
    }

    /// Warn when the produced segments disagree with the window plan
    ///
    /// Stream-copy cutting lands on packet boundaries, so small deviations
    /// are expected and not treated as errors.
    fn check_layout(&self, segments: &[Segment]) {
        let total: f64 = segments.iter().map(|s| s.duration_seconds).sum();
        let plan = plan_windows(total, self.window_seconds);

        if plan.len() != segments.len() {
            tracing::warn!(
                planned = plan.len(),
                produced = segments.len(),
                total_seconds = total,
                "Segment count differs from window plan"
            );
        }

        let window = self.window_seconds as f64;
        let last = segments.len().saturating_sub(1);
        for segment in &segments[..last] {
            if (segment.duration_seconds - window).abs() > DURATION_TOLERANCE_SECONDS {
                tracing::warn!(
                    segment_index = segment.index,
                    duration_seconds = segment.duration_seconds,
                    window_seconds = self.window_seconds,
                    "Non-final segment deviates from window length"
                );
            }
        }

        tracing::debug!(
            segments = segments.len(),
            total_seconds = total,
            "Segment layout checked"
        );
    }
}

/// Duration of a WAV file in seconds
///
/// Reads the header with `hound`. If the header is unusable (streamed output
/// can leave placeholder sizes), falls back to the byte size at the
/// normalized format.
pub async fn wav_duration_seconds(path: &Path) -> Result<f64, TranscodeError> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || match hound::WavReader::open(&path) {
        Ok(reader) => {
            let spec = reader.spec();
            if spec.sample_rate == 0 {
                return Err(TranscodeError::InvalidOutput(format!(
                    "{} reports a zero sample rate",
                    path.display()
                )));
            }
            Ok(reader.duration() as f64 / spec.sample_rate as f64)
        }
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "WAV header unreadable, estimating from size");
            let len = std::fs::metadata(&path)?.len();
            let bytes_per_second = OUTPUT_SAMPLE_RATE as u64 * OUTPUT_CHANNELS as u64 * 2;
            const HEADER_BYTES: u64 = 44;
            if len <= HEADER_BYTES {
                return Err(TranscodeError::InvalidOutput(format!(
                    "{} is not a WAV file: {}",
                    path.display(),
                    e
                )));
            }
            Ok((len - HEADER_BYTES) as f64 / bytes_per_second as f64)
        }
    })
    .await
    .map_err(|e| TranscodeError::ExecutionError(format!("Task join error: {}", e)))?
}
