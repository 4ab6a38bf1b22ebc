//! Shared server state and the connection close procedure.

use axum::extract::ws::{CloseFrame, Message, close_code};
use tokio::sync::watch;

use super::activation::ActivationManager;
use super::config::ServerConfig;
use super::event::{EventSender, ServerEvent};
use super::registry::{ClientId, ConnectionRegistry};

pub(crate) fn normal_close() -> CloseFrame {
    CloseFrame {
        code: close_code::NORMAL,
        reason: "".into(),
    }
}

pub(crate) fn size_exceeded_close() -> CloseFrame {
    CloseFrame {
        code: close_code::SIZE,
        reason: "message too big".into(),
    }
}

pub(crate) fn error_close() -> CloseFrame {
    CloseFrame {
        code: close_code::ERROR,
        reason: "".into(),
    }
}

/// Shared application state.
///
/// Lives for the lifetime of the `Server` value, across restarts, which
/// is what keeps the id counter monotonic over stop/start cycles.
pub struct AppState {
    pub config: ServerConfig,
    pub registry: ConnectionRegistry,
    pub activation: ActivationManager,
    pub events: EventSender,
    /// Flips to true when the server is stopping; sessions select on it
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    pub fn new(config: ServerConfig, events: EventSender, shutdown: watch::Receiver<bool>) -> Self {
        let registry = ConnectionRegistry::new(config.max_clients);
        Self {
            config,
            registry,
            activation: ActivationManager::new(),
            events,
            shutdown,
        }
    }

    /// Deliver an event to the owning application. Fire-and-forget; a
    /// dropped receiver is logged only.
    pub fn emit(&self, event: ServerEvent) {
        if self.events.send(event).is_err() {
            tracing::warn!("event receiver dropped, discarding event");
        }
    }

    /// Close one connection: deactivate it if it holds the election,
    /// remove it from the registry, send the close handshake, and emit
    /// the closed event. Idempotent; an unknown id is a no-op.
    pub async fn close_connection(&self, id: ClientId, frame: CloseFrame) {
        if !self.registry.contains(id).await {
            return;
        }

        self.activation.deactivate_if_active(id).await;

        // The remove is the idempotency anchor: only the caller that wins
        // it sends the handshake and emits the event.
        let Some(conn) = self.registry.remove(id).await else {
            return;
        };

        if conn.sender.send(Message::Close(Some(frame))).is_err() {
            tracing::debug!("outbound channel of client #{} already gone", id);
        }

        self.emit(ServerEvent::ConnectionClosed { id });
        let connected_for = chrono::Utc::now() - conn.connected_at;
        tracing::info!(
            "closed connection with client #{} ({}://{}, connected for {}s)",
            conn.id,
            if conn.secure { "wss" } else { "ws" },
            conn.addr,
            connected_for.num_seconds()
        );
    }

    /// Close every registered connection; used by `stop`.
    pub async fn close_all(&self) {
        for id in self.registry.ids().await {
            self.close_connection(id, normal_close()).await;
        }
    }
}
