//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" once the dispatcher stopped accepting work
    pub status: String,
    pub module: String,
    pub version: String,
    /// Short git hash the binary was built from
    pub git_hash: String,
    pub uptime_seconds: u64,
    /// Recognition calls currently in flight
    pub recognitions_in_flight: usize,
    pub recognition_capacity: usize,
    /// Last pipeline error, for diagnostics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let last_error = state.last_error.read().await.clone();
    let dispatcher = state.pipeline.dispatcher();

    Json(HealthResponse {
        status: if dispatcher.is_shut_down() { "degraded" } else { "ok" }.to_string(),
        module: "tracklog-id".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("TRACKLOG_GIT_HASH").to_string(),
        uptime_seconds,
        recognitions_in_flight: dispatcher.in_flight(),
        recognition_capacity: dispatcher.capacity(),
        last_error,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
