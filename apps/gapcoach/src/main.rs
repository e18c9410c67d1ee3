mod analysis;
mod backend_client;
mod config;
mod errors;
mod models;
mod routes;
mod sessions;
mod state;
#[cfg(test)]
mod testing;
mod workflow;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::backend_client::BackendClient;
use crate::config::Config;
use crate::routes::build_router;
use crate::sessions::SessionRegistry;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting gapcoach v{}", env!("CARGO_PKG_VERSION"));

    // One HTTP client serves both the analysis and the adaptive endpoints
    let backend = Arc::new(BackendClient::new(
        &config.backend_api_base,
        Duration::from_secs(config.backend_timeout_secs),
    )?);
    info!(
        "Backend client initialized ({}, timeout {}s)",
        backend.base_url(),
        config.backend_timeout_secs
    );

    let sessions = Arc::new(SessionRegistry::new(
        backend.clone(),
        backend,
        config.default_language.clone(),
    ));

    let state = AppState {
        sessions,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
