//! Media file records and track catalog
//!
//! POST /files, GET /files, GET /files/:id, POST /files/:id/finalize,
//! GET /tracks

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    db::{media_files, tracks},
    error::{ApiError, ApiResult},
    models::{CatalogTrack, MediaFile, MediaFileStatus, NewMediaFile, StoredDetection},
    AppState,
};

/// POST /files response
#[derive(Debug, Serialize)]
pub struct CreateFileResponse {
    pub id: i64,
    pub status: MediaFileStatus,
}

/// GET /files query
#[derive(Debug, Default, Deserialize)]
pub struct ListFilesQuery {
    pub status: Option<String>,
}

/// GET /files/:id response
#[derive(Debug, Serialize)]
pub struct FileDetailResponse {
    #[serde(flatten)]
    pub file: MediaFile,
    pub detections: Vec<StoredDetection>,
}

/// POST /files
pub async fn create_file(
    State(state): State<AppState>,
    Json(request): Json<NewMediaFile>,
) -> ApiResult<(StatusCode, Json<CreateFileResponse>)> {
    let id = media_files::insert_media_file(&state.db, &request).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateFileResponse {
            id,
            status: MediaFileStatus::NotFinished,
        }),
    ))
}

/// GET /files[?status=]
pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<ListFilesQuery>,
) -> ApiResult<Json<Vec<MediaFile>>> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<MediaFileStatus>)
        .transpose()
        .map_err(ApiError::BadRequest)?;

    Ok(Json(media_files::list_media_files(&state.db, status).await?))
}

/// GET /files/:id
pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<FileDetailResponse>> {
    let file = media_files::get_media_file(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("media file {}", id)))?;
    let detections = tracks::detections_for_file(&state.db, id).await?;

    Ok(Json(FileDetailResponse { file, detections }))
}

/// POST /files/:id/finalize
///
/// Closes review of an identified file. Refused while identification runs.
pub async fn finalize_file(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MediaFile>> {
    let file = media_files::get_media_file(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("media file {}", id)))?;

    if file.status == MediaFileStatus::Processing {
        return Err(ApiError::Conflict(format!(
            "media file {} is still being identified",
            id
        )));
    }

    media_files::set_status(&state.db, id, MediaFileStatus::Finished, None).await?;
    tracing::info!(media_file_id = id, "Media file finalized");

    let updated = media_files::get_media_file(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("media file {}", id)))?;
    Ok(Json(updated))
}

/// GET /tracks
pub async fn list_tracks(State(state): State<AppState>) -> ApiResult<Json<Vec<CatalogTrack>>> {
    Ok(Json(tracks::list_tracks(&state.db).await?))
}

/// Build media file and catalog routes
pub fn file_routes() -> Router<AppState> {
    Router::new()
        .route("/files", post(create_file).get(list_files))
        .route("/files/:id", get(get_file))
        .route("/files/:id/finalize", post(finalize_file))
        .route("/tracks", get(list_tracks))
}
