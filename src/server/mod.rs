//! Client channel surface (C15). An axum HTTP+WebSocket server exposing
//! `/healthz`, `/status` (`SPEC_FULL.md` §4.14), and the `/ws` conductor
//! endpoint (§4.13). Grounded on the teacher's `dashboard/mod.rs`:
//! `AppState` bundling shared services, a `Router` built once and served
//! with `axum::serve`, CORS applied with `tower_http`.

pub mod http;
pub mod ws;

use std::sync::Arc;

use axum::http::Method;
use axum::routing::get;
use axum::Router;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::llm::LlmPool;
use crate::store::Store;
use crate::tools::ToolRegistry;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub config: Arc<Config>,
    pub registry: Arc<ToolRegistry>,
    pub llm_pool: Arc<LlmPool>,
}

/// Bind and serve until `shutdown` fires, then return once the listener
/// has stopped accepting new connections (existing connections finish on
/// their own, matching axum's graceful-shutdown contract).
pub async fn serve(state: AppState, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST]);

    let app = Router::new()
        .route("/healthz", get(http::healthz))
        .route("/status", get(http::status))
        .route("/ws", get(ws::websocket_handler))
        .layer(cors)
        .with_state(state);

    tracing::info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
            tracing::info!("shutdown signal received, draining connections");
        })
        .await?;
    Ok(())
}
