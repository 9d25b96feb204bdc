//! HTTP listener and WebSocket upgrade endpoint.
//!
//! Every successful upgrade on the configured path (default `/ws`) becomes one
//! independent engine session. Origins are not checked and no authentication
//! is performed; deploy behind a trusted network boundary.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::BridgeConfig;
use crate::engine::EngineBinary;
use crate::session::run_session;
use crate::{AppError, Result};

/// Shared, read-only state handed to every request.
#[derive(Debug)]
pub struct AppState {
    /// Merged service configuration.
    pub config: Arc<BridgeConfig>,
    /// Engine executable resolved at startup.
    pub engine: Arc<EngineBinary>,
}

/// Handler for `GET /health`; answers without spawning an engine.
async fn health() -> &'static str {
    "ok"
}

/// Upgrade the request and hand the socket to a new engine session.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let engine = Arc::clone(&state.engine);
    ws.on_failed_upgrade(|err| {
        warn!(%err, "websocket upgrade failed");
    })
    .on_upgrade(move |socket| async move {
        if let Err(err) = run_session(socket, &engine).await {
            error!(%err, "engine session aborted");
        }
    })
}

/// Build the router: the WebSocket route plus `/health`.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    let ws_path = state.config.ws_path.clone();
    Router::new()
        .route(&ws_path, get(ws_handler))
        .route("/health", get(health))
        .with_state(state)
}

/// Bind `config.bind_addr()` and serve until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Config` if the listener cannot bind, or `AppError::Io`
/// if the server fails.
pub async fn serve(state: Arc<AppState>, ct: CancellationToken) -> Result<()> {
    let addr = state.config.bind_addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind {addr}: {err}")))?;
    serve_with_listener(listener, state, ct).await
}

/// Serve on an already-bound listener until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Io` if the server fails.
pub async fn serve_with_listener(
    listener: TcpListener,
    state: Arc<AppState>,
    ct: CancellationToken,
) -> Result<()> {
    let local = listener.local_addr()?;
    info!(
        addr = %local,
        path = %state.config.ws_path,
        engine = %state.engine.path().display(),
        "websocket bridge listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Io(format!("server error: {err}")))
}
