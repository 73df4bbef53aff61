//! Service modules for the identification pipeline
//!
//! Collaborators (transcoder, recognizer) sit behind traits so tests can
//! replace them; the pure stages (mapping, extraction, consolidation,
//! report) are plain functions over materialized lists.

pub mod audd_client;
pub mod consolidator;
pub mod dispatcher;
pub mod identification_pipeline;
pub mod metadata_extractor;
pub mod report_builder;
pub mod segmenter;
pub mod timeline_mapper;
pub mod transcoder;

pub use audd_client::{AuddClient, RecognitionError, Recognizer};
pub use consolidator::{consolidate, MERGE_GAP_SECONDS};
pub use dispatcher::{DispatchError, Dispatched, Dispatcher};
pub use identification_pipeline::{IdentificationPipeline, MediaUpload, PipelineError};
pub use metadata_extractor::{enrich, enrich_all, ProviderPayload, ISRC_MIN_LEN};
pub use report_builder::ReportBuilder;
pub use segmenter::{plan_windows, Segmenter, WindowPlan};
pub use timeline_mapper::TimelineMapper;
pub use transcoder::{FfmpegTranscoder, TranscodeError, Transcoder};
