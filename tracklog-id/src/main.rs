//! tracklog-id - Track identification service
//!
//! Accepts long media uploads over HTTP, cuts them into fixed windows,
//! recognizes each window through AudD under a global concurrency cap and
//! answers with a consolidated, timestamped track list.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tracklog_common::config::{default_config_path, load_toml_config, resolve_root_folder};
use tracklog_id::config::{resolve_audd_token, IdentifySettings};
use tracklog_id::db::{self, SqliteCatalog};
use tracklog_id::services::{AuddClient, Dispatcher, FfmpegTranscoder, IdentificationPipeline};
use tracklog_id::AppState;

/// Environment variable naming the root folder
const ROOT_FOLDER_ENV: &str = "TRACKLOG_ROOT_FOLDER";

/// Command-line arguments for tracklog-id
#[derive(Parser, Debug)]
#[command(name = "tracklog-id")]
#[command(about = "Track identification service for long media files")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5730", env = "TRACKLOG_PORT")]
    port: u16,

    /// Root folder for the database and retained audio
    #[arg(short, long, env = "TRACKLOG_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args
        .config
        .clone()
        .or_else(|| default_config_path("tracklog-id"));
    let toml_config = match &config_path {
        Some(path) => load_toml_config(path)?,
        None => Default::default(),
    };

    // RUST_LOG wins over the TOML level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "tracklog_id={level},tracklog_common={level},tower_http={level}",
                    level = toml_config.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("TRACKLOG_GIT_HASH"),
        built = env!("TRACKLOG_BUILD_TIME"),
        profile = env!("TRACKLOG_BUILD_PROFILE"),
        "Starting tracklog-id"
    );

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &toml_config);
    std::fs::create_dir_all(&root_folder)
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;
    info!("Root folder: {}", root_folder.display());

    let settings = IdentifySettings::from_toml(&toml_config)?;
    let token = resolve_audd_token(&toml_config)?;
    let transcoder = FfmpegTranscoder::locate(&settings.ffmpeg_binary)
        .await
        .context("ffmpeg is required")?;
    let recognizer = AuddClient::new(token, &settings).context("Failed to build AudD client")?;

    let db_path = root_folder.join(db::DATABASE_FILE);
    info!("Database: {}", db_path.display());
    let db_pool = db::init_database_pool(&db_path).await?;

    let dispatcher = Arc::new(Dispatcher::new(settings.max_concurrent_recognitions));
    info!(
        window_seconds = settings.window_seconds,
        max_concurrent_recognitions = settings.max_concurrent_recognitions,
        scratch_dir = %settings.scratch_dir.display(),
        "Identification pipeline configured"
    );

    let pipeline = IdentificationPipeline::new(
        Arc::new(transcoder),
        Arc::new(recognizer),
        Arc::clone(&dispatcher),
        settings,
    )
    .with_catalog(Arc::new(SqliteCatalog::new(db_pool.clone())))
    .with_combined_dir(root_folder.join("combined"));

    let state = AppState::new(db_pool, Arc::new(pipeline));
    let app = tracklog_id::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    let shutdown_dispatcher = Arc::clone(&dispatcher);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_dispatcher.shutdown();
        })
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
