//! End-to-end identification of one uploaded media file
//!
//! upload → scratch space → transcode → segment → recognize (bounded,
//! collected in segment order) → map to timeline → extract metadata →
//! consolidate → report. The media record, when one is given, moves to
//! `processing` while the run is active, then to `not_finished` with the
//! detections saved, or to `error`. Persistence is best-effort.

use axum::body::Bytes;
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use super::audd_client::Recognizer;
use super::consolidator::consolidate;
use super::dispatcher::{DispatchError, Dispatcher};
use super::metadata_extractor::enrich_all;
use super::report_builder::ReportBuilder;
use super::segmenter::Segmenter;
use super::timeline_mapper::TimelineMapper;
use super::transcoder::{TranscodeError, Transcoder};
use crate::config::IdentifySettings;
use crate::db::CatalogStore;
use crate::models::{
    ConsolidatedTrack, IdentificationReport, MediaFileStatus, RecognitionAnswer, Segment,
};
use crate::utils::{remove_file_best_effort, sanitize_file_name, ScratchSpace};

/// Errors that abort a run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Upload is empty")]
    EmptyUpload,

    #[error("Scratch space unavailable: {0}")]
    Scratch(std::io::Error),

    #[error("Transcoding failed: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("Recognition dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
}

impl PipelineError {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::EmptyUpload => "EMPTY_UPLOAD",
            PipelineError::Scratch(_) => "SCRATCH_UNAVAILABLE",
            PipelineError::Transcode(_) => "TRANSCODE_FAILED",
            PipelineError::Dispatch(_) => "DISPATCH_UNAVAILABLE",
        }
    }
}

/// One uploaded media payload
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub bytes: Bytes,
    /// Client-supplied file name, used for the scratch copy only
    pub file_name: Option<String>,
    /// Media record to report status and detections to
    pub file_id: Option<i64>,
}

/// Result of a successful run before persistence
struct RunOutcome {
    report: IdentificationReport,
    tracks: Vec<ConsolidatedTrack>,
    duration_seconds: f64,
}

/// Identification service
pub struct IdentificationPipeline {
    transcoder: Arc<dyn Transcoder>,
    recognizer: Arc<dyn Recognizer>,
    dispatcher: Arc<Dispatcher>,
    catalog: Option<Arc<dyn CatalogStore>>,
    settings: IdentifySettings,
    combined_dir: Option<PathBuf>,
}

impl IdentificationPipeline {
    pub fn new(
        transcoder: Arc<dyn Transcoder>,
        recognizer: Arc<dyn Recognizer>,
        dispatcher: Arc<Dispatcher>,
        settings: IdentifySettings,
    ) -> Self {
        Self {
            transcoder,
            recognizer,
            dispatcher,
            catalog: None,
            settings,
            combined_dir: None,
        }
    }

    /// Report status and detections to `catalog`
    pub fn with_catalog(mut self, catalog: Arc<dyn CatalogStore>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Directory for retained combined audio (used when `keep_combined_audio` is set)
    pub fn with_combined_dir(mut self, dir: PathBuf) -> Self {
        self.combined_dir = Some(dir);
        self
    }

    pub fn settings(&self) -> &IdentifySettings {
        &self.settings
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Identify the music in `upload`
    pub async fn process(&self, upload: MediaUpload) -> Result<IdentificationReport, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("identify", %run_id, file_id = ?upload.file_id);

        async move {
            if upload.bytes.is_empty() {
                return Err(PipelineError::EmptyUpload);
            }

            tracing::info!(bytes = upload.bytes.len(), "Identification started");
            if let Some(file_id) = upload.file_id {
                self.record_status(file_id, MediaFileStatus::Processing, None).await;
            }

            match self.run(run_id, &upload).await {
                Ok(outcome) => {
                    if let Some(file_id) = upload.file_id {
                        self.persist(file_id, &outcome).await;
                    }
                    tracing::info!(
                        segments = outcome.report.segment_count,
                        tracks = outcome.report.track_count,
                        "Identification complete"
                    );
                    Ok(outcome.report)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Identification failed");
                    if let Some(file_id) = upload.file_id {
                        self.record_status(file_id, MediaFileStatus::Error, None).await;
                    }
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, run_id: Uuid, upload: &MediaUpload) -> Result<RunOutcome, PipelineError> {
        let scratch =
            ScratchSpace::create(&self.settings.scratch_dir, run_id).map_err(PipelineError::Scratch)?;

        let input_name = format!(
            "input-{}",
            sanitize_file_name(upload.file_name.as_deref().unwrap_or(""))
        );
        let input = scratch.file(&input_name);
        tokio::fs::write(&input, &upload.bytes)
            .await
            .map_err(PipelineError::Scratch)?;

        let transcoded = self.transcoder.transcode(&input, scratch.path()).await;
        remove_file_best_effort(&input).await;
        let wav = transcoded?;

        let segmenter = Segmenter::new(Arc::clone(&self.transcoder), self.settings.window_seconds);
        let segmented = segmenter.split(&wav, scratch.path()).await;
        remove_file_best_effort(&wav).await;
        let segments = segmented?;

        let answers = self.recognize_all(&segments).await?;

        let combined_path = self.keep_combined(run_id, &segments, &scratch).await?;

        let mapper = TimelineMapper::new(
            self.settings.window_seconds,
            self.settings.default_match_seconds,
        );
        let detections = mapper.map_all(&answers);
        let tracks = consolidate(enrich_all(&detections));

        let report = ReportBuilder::new(run_id, self.settings.window_seconds, self.recognizer.params())
            .with_file(upload.file_id)
            .with_combined_path(combined_path)
            .build(&segments, &answers, &detections, &tracks);

        let duration_seconds = segments.iter().map(|s| s.duration_seconds).sum();
        scratch.release();

        Ok(RunOutcome {
            report,
            tracks,
            duration_seconds,
        })
    }

    /// Submit every segment up front and collect answers in segment order
    ///
    /// Dropping the returned future (client went away) skips the segments
    /// still waiting for a dispatcher slot.
    async fn recognize_all(&self, segments: &[Segment]) -> Result<Vec<RecognitionAnswer>, PipelineError> {
        let run_token = self.dispatcher.run_token();
        let _cancel_on_drop = run_token.clone().drop_guard();

        let mut pending = Vec::with_capacity(segments.len());
        for segment in segments {
            let recognizer = Arc::clone(&self.recognizer);
            let owned = segment.clone();
            let handle = self
                .dispatcher
                .submit(&run_token, async move { recognizer.identify(&owned).await })?;
            pending.push((segment.index, handle));
        }

        tracing::debug!(
            submitted = pending.len(),
            capacity = self.dispatcher.capacity(),
            "Segments submitted for recognition"
        );

        let outcomes = join_all(
            pending
                .into_iter()
                .map(|(index, handle)| async move { (index, handle.outcome().await) }),
        )
        .await;

        Ok(outcomes
            .into_iter()
            .map(|(index, outcome)| match outcome {
                Ok(answer) => answer,
                Err(e) => {
                    tracing::warn!(segment_index = index, error = %e, "Recognition did not run");
                    RecognitionAnswer::error(index, e.to_string())
                }
            })
            .collect())
    }

    /// Concatenate the segments into the combined-audio folder, when enabled
    async fn keep_combined(
        &self,
        run_id: Uuid,
        segments: &[Segment],
        scratch: &ScratchSpace,
    ) -> Result<Option<String>, PipelineError> {
        let dir = match (&self.combined_dir, self.settings.keep_combined_audio) {
            (Some(dir), true) => dir,
            _ => return Ok(None),
        };

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(TranscodeError::IoError)?;
        let output = dir.join(format!("combined-{}.wav", run_id.simple()));
        let parts: Vec<PathBuf> = segments.iter().map(|s| s.path.clone()).collect();

        let combined = self
            .transcoder
            .concatenate(&parts, scratch.path(), &output)
            .await?;
        tracing::info!(path = %combined.display(), "Combined audio kept");
        Ok(Some(combined.to_string_lossy().into_owned()))
    }

    async fn persist(&self, file_id: i64, outcome: &RunOutcome) {
        let Some(catalog) = &self.catalog else {
            return;
        };

        match catalog.save_detections(file_id, &outcome.tracks).await {
            Ok(saved) => tracing::debug!(file_id, saved = saved.len(), "Detections persisted"),
            Err(e) => tracing::warn!(file_id, error = %e, "Failed to persist detections"),
        }

        self.record_status(
            file_id,
            MediaFileStatus::NotFinished,
            Some(outcome.duration_seconds),
        )
        .await;
    }

    async fn record_status(&self, file_id: i64, status: MediaFileStatus, duration: Option<f64>) {
        let Some(catalog) = &self.catalog else {
            return;
        };
        if let Err(e) = catalog.set_status(file_id, status, duration).await {
            tracing::warn!(file_id, status = %status, error = %e, "Failed to update media file status");
        }
    }
}
