//! HTTP API handlers for tracklog-id

pub mod files;
pub mod health;
pub mod identify;

pub use files::file_routes;
pub use health::health_routes;
pub use identify::identify_routes;
