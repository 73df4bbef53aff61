//! Track catalog and detections
//!
//! A consolidated track becomes one catalog row plus one detection row.
//! Catalog rows are shared across media files when the ISRC matches.

use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracklog_common::{Error, Result};

use super::media_files;
use super::retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
use crate::models::{CatalogTrack, ConsolidatedTrack, SavedDetection, StoredDetection};
use crate::services::metadata_extractor::ProviderPayload;

/// Catalog fields of one consolidated track
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewCatalogTrack {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub label: Option<String>,
    pub genre: Option<String>,
    pub isrc: Option<String>,
}

impl NewCatalogTrack {
    /// Catalog fields from a track, album/label/genre read from its source payload
    pub fn from_track(track: &ConsolidatedTrack) -> Self {
        let payload = track
            .source_metadata
            .as_ref()
            .map(ProviderPayload::from_value)
            .unwrap_or_default();

        Self {
            title: track.title.clone(),
            artist: track.artist.clone(),
            album: payload.album(),
            label: payload.label(),
            genre: payload.genre(),
            isrc: track.isrc.clone(),
        }
    }
}

/// Catalog id for `track`, reusing the row with the same ISRC if present
pub async fn find_or_insert_track(pool: &SqlitePool, track: &NewCatalogTrack) -> Result<i64> {
    if let Some(isrc) = &track.isrc {
        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM tracks WHERE isrc = ?")
            .bind(isrc)
            .fetch_optional(pool)
            .await?;
        if let Some(id) = existing {
            return Ok(id);
        }
    }

    let result = sqlx::query(
        r#"
        INSERT INTO tracks (title, artist, album, label, genre, isrc, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&track.title)
    .bind(&track.artist)
    .bind(&track.album)
    .bind(&track.label)
    .bind(&track.genre)
    .bind(&track.isrc)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Link a catalog track to a media file at `[start, end]`
pub async fn insert_detection(
    pool: &SqlitePool,
    media_file_id: i64,
    track_id: i64,
    start_seconds: f64,
    end_seconds: f64,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO detections (media_file_id, track_id, start_seconds, end_seconds, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(media_file_id)
    .bind(track_id)
    .bind(start_seconds)
    .bind(end_seconds)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Store every track as a detection of `media_file_id`
///
/// The media file must exist. A track that fails to save is logged and
/// skipped; the ids of the saved ones are returned in input order.
pub async fn save_detections(
    pool: &SqlitePool,
    media_file_id: i64,
    tracks: &[ConsolidatedTrack],
) -> Result<Vec<SavedDetection>> {
    if media_files::get_media_file(pool, media_file_id).await?.is_none() {
        return Err(Error::NotFound(format!("media file {}", media_file_id)));
    }

    let mut saved = Vec::with_capacity(tracks.len());
    for track in tracks {
        let entry = &NewCatalogTrack::from_track(track);
        let outcome = retry_on_lock("save detection", DEFAULT_MAX_LOCK_WAIT_MS, || async move {
            let track_id = find_or_insert_track(pool, entry).await?;
            let detection_id = insert_detection(
                pool,
                media_file_id,
                track_id,
                track.start_seconds,
                track.end_seconds,
            )
            .await?;
            Ok(SavedDetection {
                track_id,
                detection_id,
            })
        })
        .await;

        match outcome {
            Ok(ids) => saved.push(ids),
            Err(e) => tracing::warn!(
                media_file_id,
                title = track.title.as_deref().unwrap_or(""),
                error = %e,
                "Failed to save detection, skipping"
            ),
        }
    }

    tracing::info!(
        media_file_id,
        saved = saved.len(),
        total = tracks.len(),
        "Detections saved"
    );
    Ok(saved)
}

/// Whole catalog, by id
pub async fn list_tracks(pool: &SqlitePool) -> Result<Vec<CatalogTrack>> {
    let rows = sqlx::query(
        "SELECT id, title, artist, album, label, genre, isrc FROM tracks ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(catalog_track_from_row).collect()
}

/// Detections of one media file, by start time
pub async fn detections_for_file(pool: &SqlitePool, media_file_id: i64) -> Result<Vec<StoredDetection>> {
    let rows = sqlx::query(
        r#"
        SELECT d.id, d.media_file_id, d.track_id, d.start_seconds, d.end_seconds,
               t.title, t.artist, t.isrc
        FROM detections d
        JOIN tracks t ON t.id = d.track_id
        WHERE d.media_file_id = ?
        ORDER BY d.start_seconds, d.id
        "#,
    )
    .bind(media_file_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(StoredDetection {
                id: row.try_get("id")?,
                media_file_id: row.try_get("media_file_id")?,
                track_id: row.try_get("track_id")?,
                start_seconds: row.try_get("start_seconds")?,
                end_seconds: row.try_get("end_seconds")?,
                title: row.try_get("title")?,
                artist: row.try_get("artist")?,
                isrc: row.try_get("isrc")?,
            })
        })
        .collect()
}

fn catalog_track_from_row(row: &SqliteRow) -> Result<CatalogTrack> {
    Ok(CatalogTrack {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        artist: row.try_get("artist")?,
        album: row.try_get("album")?,
        label: row.try_get("label")?,
        genre: row.try_get("genre")?,
        isrc: row.try_get("isrc")?,
    })
}
