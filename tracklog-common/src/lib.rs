//! # tracklog common library
//!
//! Shared code for the tracklog workspace:
//! - Error type and result alias
//! - Bootstrap configuration loading (root folder, TOML file)
//! - Timecode parsing and formatting

pub mod config;
pub mod error;
pub mod timecode;

pub use error::{Error, Result};
