//! NetPulse gateway
//!
//! Axum-based HTTP/JSON API over the NetPulse engines. Builds the router,
//! owns the shared state, and serves the query/command surface consumed by
//! the CLI and external front-ends.

pub mod routes;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::state::{AppState, SharedState};

/// Build the API router over shared state.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/status", get(routes::status))
        .route("/devices", get(routes::list_devices))
        .route("/devices/scan", post(routes::scan_devices))
        .route("/metrics", get(routes::get_metrics))
        .route("/metrics/collect", post(routes::trigger_collection))
        .route("/alerts", get(routes::list_alerts))
        .route("/alerts/:id/acknowledge", post(routes::acknowledge_alert))
        .route("/alerts/:id/resolve", post(routes::resolve_alert))
        .route("/topology", get(routes::get_topology))
        .route("/chat", post(routes::chat))
        .route("/chat/history", get(routes::chat_history))
        .route("/compliance/audit", post(routes::compliance_audit))
        .route("/compliance/status", get(routes::compliance_status))
        .route("/sla", get(routes::sla_status))
        .route("/agents", get(routes::agent_status))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Create the shared state with its collectors started.
pub async fn init_state(simulated: bool) -> anyhow::Result<SharedState> {
    let mut state = AppState::new(simulated);
    state.collector.start().await?;
    Ok(Arc::new(RwLock::new(state)))
}

/// Run the gateway server until shutdown.
pub async fn run_server(host: &str, port: u16, simulated: bool) -> anyhow::Result<()> {
    let state = init_state(simulated).await?;
    let app = build_router(state);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!("NetPulse gateway listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
