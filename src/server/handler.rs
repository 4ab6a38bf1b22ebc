//! Accept path: upgrade handling, capacity rejection, session spawning.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ConnectInfo, State,
        ws::{WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tokio::sync::mpsc;

use super::event::ServerEvent;
use super::session::run_session;
use super::state::{AppState, error_close};

/// Handle every inbound request on the single gateway path.
///
/// Non-upgrade requests are answered with 400, requests past the
/// registry capacity with 503 (before any upgrade is attempted), and a
/// failed upgrade with 500 handled by the protocol layer plus local
/// cleanup.
pub async fn websocket_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            tracing::info!("request from {} is not a WebSocket request: {}", addr, rejection);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    if state.registry.count().await + 1 > state.config.max_clients {
        tracing::warn!(
            "maximum number of clients reached, rejecting request from {}",
            addr
        );
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let id = match state.registry.insert(tx, addr, state.config.secure).await {
        Ok(id) => id,
        // Lost the race for the last slot between count and insert.
        Err(e) => {
            tracing::warn!("rejecting request from {}: {}", addr, e);
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    };

    tracing::info!("accepted connection from {} assigning id #{}", addr, id);
    state.emit(ServerEvent::ConnectionAccepted { id });

    let failed_state = state.clone();
    let session_state = state.clone();
    ws.max_message_size(state.config.max_message_size)
        .on_failed_upgrade(move |err| {
            tracing::error!("failed to upgrade connection of client #{}: {}", id, err);
            tokio::spawn(async move {
                failed_state.close_connection(id, error_close()).await;
            });
        })
        .on_upgrade(move |socket| run_session(socket, session_state, id, rx))
        .into_response()
}
