//! Media file records

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracklog_common::{Error, Result};

use crate::models::{MediaFile, MediaFileStatus, NewMediaFile};

const SELECT_COLUMNS: &str = "SELECT id, original_name, size_bytes, format, status, duration_seconds, created_at, updated_at FROM media_files";

/// Register a media file; new records start as `not_finished`
pub async fn insert_media_file(pool: &SqlitePool, file: &NewMediaFile) -> Result<i64> {
    if file.original_name.trim().is_empty() {
        return Err(Error::InvalidInput("original_name must not be empty".to_string()));
    }

    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        r#"
        INSERT INTO media_files (original_name, size_bytes, format, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&file.original_name)
    .bind(file.size_bytes)
    .bind(&file.format)
    .bind(MediaFileStatus::NotFinished.as_str())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    let id = result.last_insert_rowid();
    tracing::info!(media_file_id = id, name = %file.original_name, "Media file registered");
    Ok(id)
}

/// Load one media file
pub async fn get_media_file(pool: &SqlitePool, id: i64) -> Result<Option<MediaFile>> {
    let sql = format!("{} WHERE id = ?", SELECT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(media_file_from_row).transpose()
}

/// List media files, newest first, optionally filtered by status
pub async fn list_media_files(
    pool: &SqlitePool,
    status: Option<MediaFileStatus>,
) -> Result<Vec<MediaFile>> {
    let sql = match status {
        Some(_) => format!("{} WHERE status = ? ORDER BY id DESC", SELECT_COLUMNS),
        None => format!("{} ORDER BY id DESC", SELECT_COLUMNS),
    };
    let mut query = sqlx::query(&sql);
    if let Some(status) = status {
        query = query.bind(status.as_str());
    }
    let rows = query.fetch_all(pool).await?;

    rows.iter().map(media_file_from_row).collect()
}

/// Update status, and duration when given (a `None` duration keeps the stored one)
pub async fn set_status(
    pool: &SqlitePool,
    id: i64,
    status: MediaFileStatus,
    duration_seconds: Option<f64>,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE media_files
        SET status = ?, duration_seconds = COALESCE(?, duration_seconds), updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(status.as_str())
    .bind(duration_seconds)
    .bind(Utc::now().to_rfc3339())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("media file {}", id)));
    }

    tracing::debug!(media_file_id = id, status = %status, "Media file status updated");
    Ok(())
}

fn media_file_from_row(row: &SqliteRow) -> Result<MediaFile> {
    let status_text: String = row.try_get("status")?;
    let status = status_text.parse::<MediaFileStatus>().map_err(Error::Internal)?;

    Ok(MediaFile {
        id: row.try_get("id")?,
        original_name: row.try_get("original_name")?,
        size_bytes: row.try_get("size_bytes")?,
        format: row.try_get("format")?,
        status,
        duration_seconds: row.try_get("duration_seconds")?,
        created_at: parse_timestamp(row.try_get("created_at")?)?,
        updated_at: parse_timestamp(row.try_get("updated_at")?)?,
    })
}

pub(crate) fn parse_timestamp(text: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp {:?}: {}", text, e)))
}
