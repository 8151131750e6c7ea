use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::info;

use super::{
    services::{delete_video, download, get_video, health, list_videos, serve_file},
    state::AppState,
};
use crate::config::Config;
use crate::downloader::VideoDownloader;
use crate::library::FjallLibrary;
use crate::observability::Metrics;
use crate::pipeline::{HttpClient, HttpConfig, IngestPipeline};
use crate::storage::StorageClient;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All routes over a prepared state
pub fn router(state: AppState) -> Router {
    let download_limit = state.config.server.max_concurrent_downloads.max(1);

    Router::new()
        .route(
            "/api/download",
            post(download).layer(ConcurrencyLimitLayer::new(download_limit)),
        )
        .route("/api/videos", get(list_videos))
        .route("/api/videos/{id}", get(get_video).delete(delete_video))
        .route("/files/{*path}", get(serve_file))
        .route("/health", get(health))
        .with_state(state)
        // Automatically decompress gzip request bodies
        .layer(RequestDecompressionLayer::new())
}

/// Wire the library, blob store and downloader named by `config`
pub fn build_state(config: Config) -> Result<AppState, AnyError> {
    info!(path = %config.server.library_path.display(), "Opening video library");
    let library = FjallLibrary::open(&config.server.library_path)
        .map_err(|e| format!("Failed to open library: {}", e))?;

    let storage = StorageClient::from_config(&config.storage)
        .map_err(|e| format!("Failed to initialise storage: {}", e))?;

    let downloader = VideoDownloader::from_config(&config.downloader);
    let thumbnails = HttpClient::new(HttpConfig::default())
        .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

    let pipeline = IngestPipeline::new(
        Arc::new(downloader),
        storage,
        Arc::new(library),
        Arc::new(Metrics::new()),
    )
    .with_thumbnails(Arc::new(thumbnails));

    Ok(AppState::new(config, pipeline))
}

/// Serve until Ctrl+C or SIGTERM. `address` overrides `server.bind_addr`.
pub async fn run(address: Option<SocketAddr>) -> Result<(), AnyError> {
    info!("Loading configuration");
    let config = Config::load().map_err(|e| format!("Failed to load config: {}", e))?;
    let address = address.unwrap_or(config.server.bind_addr);

    let app = router(build_state(config)?);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "clipstash API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
