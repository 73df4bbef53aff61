//! Database test utilities

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use tracklog_id::db::{self, media_files};
use tracklog_id::models::NewMediaFile;

/// In-memory database with the tracklog tables
///
/// A single connection, since every `:memory:` connection is its own database.
pub async fn create_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::init_tables(&pool).await.unwrap();
    pool
}

/// Register a media file and return its id
pub async fn seed_media_file(pool: &SqlitePool, name: &str) -> i64 {
    media_files::insert_media_file(
        pool,
        &NewMediaFile {
            original_name: name.to_string(),
            size_bytes: Some(1024),
            format: Some("mp3".to_string()),
        },
    )
    .await
    .unwrap()
}
