//! Database access for tracklog-id
//!
//! SQLite file `tracklog.db` in the root folder. Holds registered media
//! files, the catalog of identified tracks and the detections linking them.

pub mod media_files;
pub mod retry;
pub mod tracks;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::path::Path;

use crate::models::{ConsolidatedTrack, MediaFileStatus, SavedDetection};

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "tracklog.db";

/// Initialize database connection pool
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS media_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            original_name TEXT NOT NULL,
            size_bytes INTEGER,
            format TEXT,
            status TEXT NOT NULL DEFAULT 'not_finished',
            duration_seconds REAL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tracks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT,
            artist TEXT,
            album TEXT,
            label TEXT,
            genre TEXT,
            isrc TEXT UNIQUE,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS detections (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            media_file_id INTEGER NOT NULL REFERENCES media_files(id) ON DELETE CASCADE,
            track_id INTEGER NOT NULL REFERENCES tracks(id),
            start_seconds REAL NOT NULL,
            end_seconds REAL NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_detections_media_file ON detections(media_file_id)")
        .execute(pool)
        .await?;

    tracing::info!("Database tables initialized (media_files, tracks, detections)");

    Ok(())
}

/// Persistence collaborator of the identification pipeline
///
/// The pipeline treats every call as best-effort: errors are logged by the
/// caller and never abort a run.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Update a media file's status, and its duration when known
    async fn set_status(
        &self,
        file_id: i64,
        status: MediaFileStatus,
        duration_seconds: Option<f64>,
    ) -> tracklog_common::Result<()>;

    /// Store consolidated tracks as detections of `file_id`
    async fn save_detections(
        &self,
        file_id: i64,
        tracks: &[ConsolidatedTrack],
    ) -> tracklog_common::Result<Vec<SavedDetection>>;
}

/// [`CatalogStore`] over the SQLite pool
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
    async fn set_status(
        &self,
        file_id: i64,
        status: MediaFileStatus,
        duration_seconds: Option<f64>,
    ) -> tracklog_common::Result<()> {
        retry::retry_on_lock("set media file status", retry::DEFAULT_MAX_LOCK_WAIT_MS, || {
            media_files::set_status(&self.pool, file_id, status, duration_seconds)
        })
        .await
    }

    async fn save_detections(
        &self,
        file_id: i64,
        tracks: &[ConsolidatedTrack],
    ) -> tracklog_common::Result<Vec<SavedDetection>> {
        tracks::save_detections(&self.pool, file_id, tracks).await
    }
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    init_tables(&pool).await.unwrap();
    pool
}
