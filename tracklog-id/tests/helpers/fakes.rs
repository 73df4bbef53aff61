//! In-process stand-ins for ffmpeg and the recognition service

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracklog_id::config::IdentifySettings;
use tracklog_id::models::{RecognitionAnswer, RecognizerParams, Segment};
use tracklog_id::services::transcoder::{NORMALIZED_WAV, SEGMENT_PREFIX};
use tracklog_id::services::{
    plan_windows, Dispatcher, IdentificationPipeline, Recognizer, TranscodeError, Transcoder,
};

use super::audio_generator::{generate_test_wav, wav_seconds};

/// Window length used by pipeline tests
pub const TEST_WINDOW_SECONDS: u32 = 2;

/// Default match span used by pipeline tests
pub const TEST_DEFAULT_MATCH_SECONDS: f64 = 1.0;

fn fixture_error(e: anyhow::Error) -> TranscodeError {
    TranscodeError::InvalidOutput(e.to_string())
}

/// Transcoder that writes WAV fixtures instead of running ffmpeg
///
/// Every upload "decodes" to `source_seconds` of audio.
pub struct FakeTranscoder {
    source_seconds: f64,
    fail_transcode: bool,
    work_dirs: Mutex<Vec<PathBuf>>,
}

impl FakeTranscoder {
    pub fn new(source_seconds: f64) -> Self {
        Self {
            source_seconds,
            fail_transcode: false,
            work_dirs: Mutex::new(Vec::new()),
        }
    }

    /// Transcoder that rejects every input like ffmpeg does with garbage
    pub fn failing() -> Self {
        Self {
            fail_transcode: true,
            ..Self::new(0.0)
        }
    }

    /// Scratch directories the pipeline handed in
    pub fn work_dirs(&self) -> Vec<PathBuf> {
        self.work_dirs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(&self, input: &Path, work_dir: &Path) -> Result<PathBuf, TranscodeError> {
        self.work_dirs.lock().unwrap().push(work_dir.to_path_buf());

        if !input.exists() {
            return Err(TranscodeError::InvalidOutput(format!(
                "input {} was not written",
                input.display()
            )));
        }
        if self.fail_transcode {
            return Err(TranscodeError::Failed {
                step: "transcode",
                code: Some(1),
                stderr: "Invalid data found when processing input".to_string(),
            });
        }

        generate_test_wav(&work_dir.join(NORMALIZED_WAV), self.source_seconds).map_err(fixture_error)
    }

    async fn segment(
        &self,
        wav: &Path,
        window_seconds: u32,
        work_dir: &Path,
    ) -> Result<Vec<PathBuf>, TranscodeError> {
        let total = wav_seconds(wav).map_err(fixture_error)?;

        plan_windows(total, window_seconds)
            .into_iter()
            .map(|window| {
                let path = work_dir.join(format!("{}{:03}.wav", SEGMENT_PREFIX, window.index));
                generate_test_wav(&path, window.duration_seconds).map_err(fixture_error)
            })
            .collect()
    }

    async fn concatenate(
        &self,
        parts: &[PathBuf],
        _work_dir: &Path,
        output: &Path,
    ) -> Result<PathBuf, TranscodeError> {
        let mut total = 0.0;
        for part in parts {
            total += wav_seconds(part).map_err(fixture_error)?;
        }
        generate_test_wav(output, total).map_err(fixture_error)
    }
}

/// Recognizer answering from a per-segment script
///
/// Segments without a scripted payload get a no-match answer. Tracks how
/// many calls ran at once.
#[derive(Default)]
pub struct ScriptedRecognizer {
    script: HashMap<usize, Value>,
    delays: HashMap<usize, Duration>,
    default_delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    started: AtomicUsize,
    finished: AtomicUsize,
    missing_files: AtomicUsize,
}

impl ScriptedRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_answer(mut self, index: usize, payload: Value) -> Self {
        self.script.insert(index, payload);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn with_segment_delay(mut self, index: usize, delay: Duration) -> Self {
        self.delays.insert(index, delay);
        self
    }

    /// Highest number of calls observed running at once
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    /// Calls whose segment file was already gone
    pub fn missing_files(&self) -> usize {
        self.missing_files.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn identify(&self, segment: &Segment) -> RecognitionAnswer {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !segment.path.exists() {
            self.missing_files.fetch_add(1, Ordering::SeqCst);
        }

        let delay = self
            .delays
            .get(&segment.index)
            .copied()
            .unwrap_or(self.default_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.finished.fetch_add(1, Ordering::SeqCst);

        let payload = self
            .script
            .get(&segment.index)
            .cloned()
            .unwrap_or_else(|| json!({"status": "success", "result": null}));
        RecognitionAnswer::from_payload(segment.index, payload)
    }

    fn params(&self) -> RecognizerParams {
        RecognizerParams {
            return_fields: "timecode,apple_music,deezer".to_string(),
        }
    }
}

/// Settings with short windows and scratch space under `scratch_dir`
pub fn test_settings(scratch_dir: &Path) -> IdentifySettings {
    IdentifySettings {
        window_seconds: TEST_WINDOW_SECONDS,
        default_match_seconds: TEST_DEFAULT_MATCH_SECONDS,
        scratch_dir: scratch_dir.to_path_buf(),
        ..Default::default()
    }
}

/// Pipeline over the fakes with its own dispatcher of `capacity`
pub fn test_pipeline(
    transcoder: Arc<FakeTranscoder>,
    recognizer: Arc<ScriptedRecognizer>,
    capacity: usize,
    scratch_dir: &Path,
) -> IdentificationPipeline {
    IdentificationPipeline::new(
        transcoder,
        recognizer,
        Arc::new(Dispatcher::new(capacity)),
        test_settings(scratch_dir),
    )
}

/// Matching payload with a segment-local timecode range
pub fn hit(title: &str, timecode: &str) -> Value {
    json!({
        "status": "success",
        "result": {"title": title, "timecode": timecode}
    })
}

/// Service-side error payload
pub fn service_error(message: &str) -> Value {
    json!({
        "status": "error",
        "error": {"error_code": 901, "error_message": message}
    })
}
