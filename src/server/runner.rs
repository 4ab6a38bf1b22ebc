//! Server lifecycle: start, stop, restart.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, routing::any};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::error::ServerError;

use super::config::ServerConfig;
use super::event::EventSender;
use super::handler::websocket_handler;
use super::registry::ClientId;
use super::state::AppState;

/// Bound on how long `stop` waits for in-flight sessions to drain.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

struct ServeHandle {
    task: JoinHandle<()>,
    addr: SocketAddr,
}

/// The now-playing gateway server.
///
/// Owns the accept loop and all per-connection tasks. Events are
/// delivered to the owning application through the channel handed to
/// [`Server::new`]. The id counter lives as long as this value, so ids
/// stay unique across restarts.
pub struct Server {
    state: Arc<AppState>,
    shutdown_tx: watch::Sender<bool>,
    serve: Mutex<Option<ServeHandle>>,
}

impl Server {
    pub fn new(config: ServerConfig, events: EventSender) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            state: Arc::new(AppState::new(config, events, shutdown_rx)),
            shutdown_tx,
            serve: Mutex::new(None),
        }
    }

    /// Bind and begin accepting connections.
    ///
    /// Idempotent: a no-op while already running. A bind failure is
    /// logged and leaves the server stopped; it is never raised.
    pub async fn start(&self) {
        let mut serve = self.serve.lock().await;
        if serve.is_some() {
            tracing::debug!("server already running");
            return;
        }

        let config = &self.state.config;
        if config.secure {
            tracing::warn!("wss termination is not implemented, serving plain ws");
        }

        let bind_addr = config.bind_addr();
        let listener = match TcpListener::bind(&bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!(
                    "can't start server: {}",
                    ServerError::Bind {
                        addr: bind_addr,
                        source: e,
                    }
                );
                return;
            }
        };
        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                tracing::error!("can't start server: {}", ServerError::Serve(e));
                return;
            }
        };

        // Rearm the stop signal for this run.
        self.shutdown_tx.send_replace(false);

        let app = Router::new()
            .route("/", any(websocket_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone());

        let mut shutdown = self.state.shutdown.clone();
        let task = tokio::spawn(async move {
            let result = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stopped| *stopped).await;
            })
            .await;

            if let Err(e) = result {
                tracing::error!("server error: {}", e);
            }
        });

        tracing::info!("now-playing gateway listening on ws://{}/", addr);
        *serve = Some(ServeHandle { task, addr });
    }

    /// Close every live connection, stop accepting, and wait (bounded)
    /// for in-flight read loops to finish. The registry is empty when
    /// this returns. Idempotent: a no-op while not running.
    pub async fn stop(&self) {
        let handle = self.serve.lock().await.take();
        let Some(handle) = handle else {
            tracing::debug!("server not running");
            return;
        };

        self.state.close_all().await;
        self.shutdown_tx.send_replace(true);

        let mut task = handle.task;
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut task).await {
            Ok(Ok(())) => tracing::info!("server stopped"),
            Ok(Err(e)) => tracing::error!("serve task failed during shutdown: {}", e),
            Err(_) => {
                tracing::error!("timed out waiting for sessions to finish, aborting");
                task.abort();
            }
        }
    }

    /// Stop, then start again. The id counter continues.
    pub async fn restart(&self) {
        tracing::info!("restarting server...");
        self.stop().await;
        self.start().await;
    }

    pub async fn is_running(&self) -> bool {
        self.serve.lock().await.is_some()
    }

    /// The bound address while running.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.serve.lock().await.as_ref().map(|handle| handle.addr)
    }

    pub async fn connection_count(&self) -> usize {
        self.state.registry.count().await
    }

    /// The id of the currently active producer.
    pub async fn active_client_id(&self) -> Option<ClientId> {
        self.state.activation.active_id().await
    }

    /// Elect the active producer, or clear the election with `None`.
    pub async fn set_active_client_id(&self, id: Option<ClientId>) {
        self.state
            .activation
            .set_active(&self.state.registry, id)
            .await;
    }
}
