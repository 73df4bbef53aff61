//! Test helper utilities
//!
//! Shared by the integration test binaries; each binary uses a subset.
#![allow(dead_code, unused_imports)]

pub mod audio_generator;
pub mod db_utils;
pub mod fakes;

pub use audio_generator::{generate_test_wav, wav_seconds};
pub use db_utils::{create_test_db, seed_media_file};
pub use fakes::{
    hit, service_error, test_pipeline, test_settings, FakeTranscoder, ScriptedRecognizer,
    TEST_DEFAULT_MATCH_SECONDS, TEST_WINDOW_SECONDS,
};
