//! State construction, router assembly and the run loop.

use super::config::AppConfig;
use anyhow::{ensure, Context, Result};
use axum::routing::get;
use buslive_core::{
    shutdown_signal, spawn_refresh_loops, BusRegistry, RelayState, UpstreamClient,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{info, warn};

/// Build the shared state, start one refresh loop per bus and serve the HTTP
/// API until shutdown.
pub async fn run(config: AppConfig) -> Result<()> {
    ensure!(
        !config.upstream.base_url.is_empty(),
        "upstream.base_url is not configured (set UPSTREAM_BASE_URL)"
    );

    ensure!(
        config.upstream.cache_ttl_secs > 0.0 && config.upstream.cache_ttl_secs.is_finite(),
        "upstream.cache_ttl_secs must be a positive number"
    );

    let registry = BusRegistry::new(config.buses.ids.clone());
    ensure!(!registry.is_empty(), "bus id list is empty");

    let fetcher = Arc::new(
        UpstreamClient::new(&config.upstream.base_url)
            .context("Failed to build upstream client")?,
    );
    let ttl = Duration::from_secs_f64(config.upstream.cache_ttl_secs);
    let state = Arc::new(RelayState::with_ttl(registry, fetcher, ttl));

    let shutdown = CancellationToken::new();
    let refresh_handles = spawn_refresh_loops(&state, &shutdown);
    info!(
        buses = state.registry.len(),
        ttl_secs = config.upstream.cache_ttl_secs,
        "refresh loops started"
    );

    let app = crate::api::app_router(state);

    // SPA static files, or a plain text root when no frontend is deployed
    let app = if let Some(static_dir) = &config.server.static_dir {
        let dir = std::path::Path::new(static_dir);
        if dir.exists() {
            info!("serving static frontend from {}", dir.display());
            let serve_dir = ServeDir::new(dir)
                .append_index_html_on_directories(true)
                .fallback(ServeFile::new(dir.join("index.html")));
            app.fallback_service(serve_dir)
        } else {
            warn!("static_dir {} does not exist, skipping", dir.display());
            app.route("/", get(|| async { "buslive relay" }))
        }
    } else {
        app.route("/", get(|| async { "buslive relay" }))
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("HTTP server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .context("HTTP server error")?;

    // Covers any exit path where the signal future never fired
    shutdown.cancel();

    let loop_timeout = Duration::from_secs(5);
    for handle in refresh_handles {
        match tokio::time::timeout(loop_timeout, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("refresh loop task error: {e}"),
            Err(_) => warn!("refresh loop shutdown timeout"),
        }
    }

    info!("buslive shutdown complete");
    Ok(())
}
