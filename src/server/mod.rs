//! # Web Server
//!
//! Serves the relay API and the static upload page.
//!
//! ## Modules
//!
//! - [`routes`]: request handlers and the JSON shapes they exchange

pub mod routes;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use log::info;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::common::config::RelayConfig;
use crate::relay::{HttpUpstream, RelayMiddleware, Upstream};

/// Shared, read-only state of the running server.
pub struct AppState {
    pub relay: RelayMiddleware,
    pub config: RelayConfig,
}

impl AppState {
    pub fn new(config: RelayConfig, upstream: Arc<dyn Upstream>) -> Self {
        let relay = RelayMiddleware::new(upstream, config.upstream.timeout());
        Self { relay, config }
    }

    /// State talking to the configured HTTP upstream.
    pub fn from_config(config: RelayConfig) -> Result<Self> {
        let upstream = Arc::new(HttpUpstream::new(&config.upstream)?);
        Ok(Self::new(config, upstream))
    }
}

/// Builds the application router.
///
/// Paths outside `/api` fall through to the static directory holding the
/// upload page.
pub fn router(state: Arc<AppState>) -> Router {
    let static_dir = ServeDir::new(&state.config.server.static_dir);
    let body_limit = state.config.server.max_body_bytes;

    Router::new()
        .route("/api/image/process", post(routes::process_image))
        .route("/api/image/upload", post(routes::upload_image))
        .route("/api/health", get(routes::health_check))
        .fallback_service(static_dir)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds the configured address and serves until Ctrl-C.
pub async fn serve(config: RelayConfig) -> Result<()> {
    config.validate()?;

    let addr = config.server.address.clone();
    let state = Arc::new(AppState::from_config(config)?);

    info!("🌐 Web server running on http://{}", addr);
    info!("📡 API endpoint: http://{}/api/image/process", addr);
    info!(
        "🔗 Relaying to {} (timeout {}s)",
        state.relay.endpoint(),
        state.relay.timeout().as_secs()
    );

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Web server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested, finishing in-flight requests...");
}
