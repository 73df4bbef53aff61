//! Audio transcoding collaborator
//!
//! Normalizes arbitrary media to PCM s16le / 2 channels / 44100 Hz WAV, cuts
//! the WAV into fixed windows and concatenates windows back together. The
//! production implementation drives the `ffmpeg` command-line tool.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

/// Normalized output format
pub const OUTPUT_SAMPLE_RATE: u32 = 44_100;
pub const OUTPUT_CHANNELS: u16 = 2;

/// File name of the normalized WAV inside a work directory
pub const NORMALIZED_WAV: &str = "normalized.wav";

/// Prefix of segment files inside a work directory
pub const SEGMENT_PREFIX: &str = "segment-";

/// Transcoder errors
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// ffmpeg binary not found
    #[error("Transcoder binary not found: {0}")]
    BinaryNotFound(String),

    /// Failed to spawn or wait for the transcoder
    #[error("Failed to execute transcoder: {0}")]
    ExecutionError(String),

    /// Transcoder ran but reported failure
    #[error("{step} failed (exit code {code:?}): {stderr}")]
    Failed {
        step: &'static str,
        code: Option<i32>,
        stderr: String,
    },

    /// Transcoder produced unusable output
    #[error("Invalid transcoder output: {0}")]
    InvalidOutput(String),

    /// I/O error (file read/write)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Transcoding operations used by the pipeline
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Convert `input` to a normalized WAV inside `work_dir`
    async fn transcode(&self, input: &Path, work_dir: &Path) -> Result<PathBuf, TranscodeError>;

    /// Cut `wav` into `window_seconds` windows inside `work_dir`, in order
    async fn segment(
        &self,
        wav: &Path,
        window_seconds: u32,
        work_dir: &Path,
    ) -> Result<Vec<PathBuf>, TranscodeError>;

    /// Join `parts` in order into `output`
    async fn concatenate(
        &self,
        parts: &[PathBuf],
        work_dir: &Path,
        output: &Path,
    ) -> Result<PathBuf, TranscodeError>;
}

/// ffmpeg-backed transcoder
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: String,
}

impl FfmpegTranscoder {
    /// Verify `binary` runs (`-version`) and build a transcoder around it
    pub async fn locate(binary: &str) -> Result<Self, TranscodeError> {
        let probe = Command::new(binary)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match probe {
            Ok(status) if status.success() => {
                tracing::info!(binary, "ffmpeg available");
                Ok(Self {
                    binary: binary.to_string(),
                })
            }
            Ok(status) => Err(TranscodeError::ExecutionError(format!(
                "{} -version exited with {:?}",
                binary,
                status.code()
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TranscodeError::BinaryNotFound(binary.to_string()))
            }
            Err(e) => Err(TranscodeError::ExecutionError(e.to_string())),
        }
    }

    async fn run(&self, step: &'static str, args: Vec<OsString>) -> Result<(), TranscodeError> {
        tracing::debug!(step, binary = %self.binary, "Running ffmpeg");

        let output = Command::new(&self.binary)
            .args(["-hide_banner", "-nostdin", "-loglevel", "error", "-y"])
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => TranscodeError::BinaryNotFound(self.binary.clone()),
                _ => TranscodeError::ExecutionError(e.to_string()),
            })?;

        if !output.status.success() {
            return Err(TranscodeError::Failed {
                step,
                code: output.status.code(),
                stderr: stderr_tail(&output.stderr),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, input: &Path, work_dir: &Path) -> Result<PathBuf, TranscodeError> {
        let output = work_dir.join(NORMALIZED_WAV);
        let args: Vec<OsString> = vec![
            "-i".into(),
            input.into(),
            "-vn".into(),
            "-acodec".into(),
            "pcm_s16le".into(),
            "-ac".into(),
            OUTPUT_CHANNELS.to_string().into(),
            "-ar".into(),
            OUTPUT_SAMPLE_RATE.to_string().into(),
            output.clone().into(),
        ];

        self.run("transcode", args).await?;
        tracing::info!(input = %input.display(), output = %output.display(), "Transcode complete");
        Ok(output)
    }

    async fn segment(
        &self,
        wav: &Path,
        window_seconds: u32,
        work_dir: &Path,
    ) -> Result<Vec<PathBuf>, TranscodeError> {
        let pattern = work_dir.join(format!("{}%03d.wav", SEGMENT_PREFIX));
        let args: Vec<OsString> = vec![
            "-i".into(),
            wav.into(),
            "-f".into(),
            "segment".into(),
            "-segment_time".into(),
            window_seconds.to_string().into(),
            "-reset_timestamps".into(),
            "1".into(),
            "-c".into(),
            "copy".into(),
            pattern.into(),
        ];

        self.run("segment", args).await?;

        let segments = list_segment_files(work_dir).await?;
        if segments.is_empty() {
            return Err(TranscodeError::InvalidOutput(
                "segmentation produced no segment files".to_string(),
            ));
        }
        tracing::info!(count = segments.len(), window_seconds, "Segmentation complete");
        Ok(segments)
    }

    async fn concatenate(
        &self,
        parts: &[PathBuf],
        work_dir: &Path,
        output: &Path,
    ) -> Result<PathBuf, TranscodeError> {
        let list_file = work_dir.join("concat-list.txt");
        tokio::fs::write(&list_file, concat_list(parts)).await?;

        let args: Vec<OsString> = vec![
            "-f".into(),
            "concat".into(),
            "-safe".into(),
            "0".into(),
            "-i".into(),
            list_file.clone().into(),
            "-c".into(),
            "copy".into(),
            output.into(),
        ];

        let result = self.run("concatenate", args).await;
        crate::utils::remove_file_best_effort(&list_file).await;
        result?;

        Ok(output.to_path_buf())
    }
}

/// Segment files in `dir`, in index order
///
/// Ordered by the number after [`SEGMENT_PREFIX`], not by name: ffmpeg
/// widens the counter past its padding (`segment-1000.wav`). Numbering must
/// run from 0 without gaps.
pub async fn list_segment_files(dir: &Path) -> Result<Vec<PathBuf>, TranscodeError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut numbered = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if let Some(number) = segment_number(&entry.file_name().to_string_lossy()) {
            numbered.push((number, entry.path()));
        }
    }
    numbered.sort_by_key(|(number, _)| *number);

    for (position, (number, path)) in numbered.iter().enumerate() {
        if *number != position {
            return Err(TranscodeError::InvalidOutput(format!(
                "segment numbering broken: expected {} at {}",
                position,
                path.display()
            )));
        }
    }

    Ok(numbered.into_iter().map(|(_, path)| path).collect())
}

/// Index encoded in a segment file name (`segment-007.wav` is 7)
fn segment_number(name: &str) -> Option<usize> {
    let digits = name.strip_prefix(SEGMENT_PREFIX)?.strip_suffix(".wav")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// ffmpeg concat demuxer list: one `file '<path>'` line per part
fn concat_list(parts: &[PathBuf]) -> String {
    parts
        .iter()
        .map(|p| {
            let path = p.to_string_lossy().replace('\\', "/").replace('\'', "'\\''");
            format!("file '{}'", path)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn stderr_tail(stderr: &[u8]) -> String {
    const MAX_CHARS: usize = 2000;
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let count = text.chars().count();
    if count <= MAX_CHARS {
        text.to_string()
    } else {
        text.chars().skip(count - MAX_CHARS).collect()
    }
}
