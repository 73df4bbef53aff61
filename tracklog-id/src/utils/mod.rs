//! Utility modules for tracklog-id

pub mod scratch;

pub use scratch::{remove_file_best_effort, sanitize_file_name, ScratchSpace};
