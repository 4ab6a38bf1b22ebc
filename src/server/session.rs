//! Per-connection read loop.
//!
//! One session owns two tasks: the read loop consuming complete logical
//! messages from the socket, and a forwarder draining the connection's
//! outbound channel into it. Errors in one session never propagate to
//! the accept loop or to other sessions.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::sync::mpsc;

use crate::payload::Payload;

use super::event::ServerEvent;
use super::registry::ClientId;
use super::state::{AppState, error_close, normal_close, size_exceeded_close};

/// Run one connection to completion.
///
/// Always ends in the close procedure; `close_connection` is idempotent,
/// so racing with `close_all` is harmless.
pub async fn run_session(
    socket: WebSocket,
    state: Arc<AppState>,
    id: ClientId,
    rx: mpsc::UnboundedReceiver<Message>,
) {
    let (sink, stream) = socket.split();
    let mut send_task = tokio::spawn(forward_outbound(sink, rx));

    let frame = read_loop(stream, &state, id).await;
    state.close_connection(id, frame).await;

    // Give the forwarder a moment to flush the close handshake.
    if tokio::time::timeout(Duration::from_secs(1), &mut send_task)
        .await
        .is_err()
    {
        send_task.abort();
    }
}

/// Drain the outbound channel into the socket.
///
/// Ends when every sender is gone (the connection was removed from the
/// registry) or once a close frame went out.
async fn forward_outbound(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let is_close = matches!(msg, Message::Close(_));
        if sink.send(msg).await.is_err() || is_close {
            break;
        }
    }
}

/// Receive logical messages until the connection ends, returning the
/// close frame to finish with.
async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    state: &AppState,
    id: ClientId,
) -> CloseFrame {
    let mut shutdown = state.shutdown.clone();

    loop {
        let incoming = tokio::select! {
            incoming = stream.next() => incoming,
            _ = shutdown.wait_for(|stopped| *stopped) => {
                tracing::debug!("shutdown requested, ending read loop of client #{}", id);
                return normal_close();
            }
        };

        let Some(incoming) = incoming else {
            tracing::debug!("client #{} went away", id);
            return normal_close();
        };

        match incoming {
            Ok(Message::Text(text)) => {
                if let Some(frame) = handle_message(state, id, text.as_bytes()).await {
                    return frame;
                }
            }
            Ok(Message::Binary(data)) => {
                if let Some(frame) = handle_message(state, id, &data).await {
                    return frame;
                }
            }
            Ok(Message::Close(_)) => {
                tracing::info!("received close message from client #{}", id);
                return normal_close();
            }
            // ping/pong are answered by the protocol layer
            Ok(_) => {}
            Err(e) => {
                tracing::error!("failed to receive data from client #{}: {}", id, e);
                return close_frame_for_error(&e);
            }
        }
    }
}

/// Process one complete logical message. Returns a close frame when the
/// connection must be terminated.
async fn handle_message(state: &AppState, id: ClientId, bytes: &[u8]) -> Option<CloseFrame> {
    // The protocol layer enforces the limit while assembling fragments;
    // this guards the assembled length.
    if bytes.len() > state.config.max_message_size {
        tracing::error!(
            "message from client #{} is too big to process ({} b)",
            id,
            bytes.len()
        );
        return Some(size_exceeded_close());
    }

    tracing::debug!("received data from client #{} ({} b)", id, bytes.len());

    // Only the active producer may push; everything else is dropped
    // without decoding.
    if state.activation.active_id().await != Some(id) {
        tracing::trace!("discarding message from inactive client #{}", id);
        return None;
    }

    match Payload::decode(bytes) {
        Ok(payload) => state.emit(ServerEvent::DataReceived { id, payload }),
        Err(e) => tracing::error!("failed to decode payload from client #{}: {}", id, e),
    }

    None
}

/// Map a transport error onto the close status to finish with.
fn close_frame_for_error(err: &axum::Error) -> CloseFrame {
    // The protocol layer reports a message growing past the configured
    // limit as a capacity error.
    if err.to_string().contains("Message too long") {
        size_exceeded_close()
    } else {
        error_close()
    }
}
