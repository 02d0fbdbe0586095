//! Affinity Relationship Server Library
//!
//! Like/follow toggles over a uniquely-keyed relationship store, fronted by a
//! short-lived existence cache and served over HTTP.

pub mod cache;
pub mod config;
pub mod content;
pub mod core;
pub mod relationships;

use axum::{middleware, routing::get, Router};
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{AppState, ServerConfig};
use crate::core::auth::middleware::mw_ctx_resolver;

/// Full HTTP surface over `state`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(relationships::router())
        // Health check
        .route("/health", get(health_check))
        .layer(middleware::from_fn_with_state(state.clone(), mw_ctx_resolver))
        .with_state(state)
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

pub async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_err()
    {
        // Already set, ignore
    }

    info!("=== Affinity Server ===");

    let config = ServerConfig::from_env();
    info!("Storage: {:?} at {:?}", config.storage, config.data_dir);

    let port = config.port;
    let state = AppState::open(config).await?;
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK - Affinity"
}
