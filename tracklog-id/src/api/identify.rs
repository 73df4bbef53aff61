//! Identification endpoint
//!
//! POST /identify?file_id=&filename= with the raw media as request body.

use axum::{
    body::Bytes,
    extract::{Query, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use crate::{
    error::{ApiError, ApiResult},
    models::IdentificationReport,
    services::MediaUpload,
    AppState,
};

/// POST /identify query parameters
#[derive(Debug, Default, Deserialize)]
pub struct IdentifyQuery {
    /// Media record to report status and detections to
    pub file_id: Option<i64>,
    /// Original file name, informational
    pub filename: Option<String>,
}

/// POST /identify
///
/// Runs the full pipeline and answers with the identification report.
pub async fn identify(
    State(state): State<AppState>,
    Query(query): Query<IdentifyQuery>,
    body: Bytes,
) -> ApiResult<Json<IdentificationReport>> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("Request body is empty".to_string()));
    }

    let detected = detect_format(&body)?;
    tracing::info!(
        bytes = body.len(),
        format = detected.unwrap_or("unknown"),
        filename = query.filename.as_deref().unwrap_or(""),
        file_id = ?query.file_id,
        "Identification requested"
    );

    let upload = MediaUpload {
        bytes: body,
        file_name: query.filename,
        file_id: query.file_id,
    };

    match state.pipeline.process(upload).await {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            *state.last_error.write().await = Some(e.to_string());
            Err(e.into())
        }
    }
}

/// Sniff the upload's container format
///
/// Unknown formats pass through to the transcoder; formats known not to
/// carry audio are rejected.
fn detect_format(body: &[u8]) -> ApiResult<Option<&'static str>> {
    let Some(kind) = infer::get(body) else {
        return Ok(None);
    };

    match kind.matcher_type() {
        infer::MatcherType::Audio | infer::MatcherType::Video => Ok(Some(kind.extension())),
        _ => Err(ApiError::BadRequest(format!(
            "Unsupported media type: {}",
            kind.mime_type()
        ))),
    }
}

/// Build identification routes
pub fn identify_routes() -> Router<AppState> {
    Router::new().route("/identify", post(identify))
}
