//! Thread-safe store of live connections.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};

/// Identifier assigned to a connection. Monotonically increasing, never
/// reused within one `Server` instance.
pub type ClientId = u64;

/// Error returned when the registry is at capacity.
#[derive(Debug, Error)]
#[error("registry is full ({capacity} connections)")]
pub struct RegistryFull {
    pub capacity: usize,
}

/// A live producer connection.
///
/// Owned exclusively by the registry once registered; removal discards it
/// permanently. Outbound messages go through `sender`, consumed by the
/// connection's forwarding task, so no lock is ever held across a socket
/// write.
pub struct Connection {
    pub id: ClientId,
    pub sender: mpsc::UnboundedSender<Message>,
    pub addr: SocketAddr,
    pub secure: bool,
    pub connected_at: DateTime<Utc>,
}

struct RegistryInner {
    connections: HashMap<ClientId, Connection>,
    next_id: ClientId,
}

/// Store of live connections keyed by id, bounded by a maximum count.
///
/// The inner mutex is a leaf lock: no other lock is ever acquired while
/// it is held, so registry methods may be called from any context.
pub struct ConnectionRegistry {
    inner: Mutex<RegistryInner>,
    capacity: usize,
}

impl ConnectionRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                connections: HashMap::new(),
                next_id: 0,
            }),
            capacity,
        }
    }

    /// Register a connection, assigning the next id.
    ///
    /// Id assignment and the capacity check happen under one lock, so ids
    /// are unique and the size bound holds under concurrent accepts.
    pub async fn insert(
        &self,
        sender: mpsc::UnboundedSender<Message>,
        addr: SocketAddr,
        secure: bool,
    ) -> Result<ClientId, RegistryFull> {
        let mut inner = self.inner.lock().await;
        if inner.connections.len() + 1 > self.capacity {
            return Err(RegistryFull {
                capacity: self.capacity,
            });
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner.connections.insert(
            id,
            Connection {
                id,
                sender,
                addr,
                secure,
                connected_at: Utc::now(),
            },
        );
        Ok(id)
    }

    /// Remove and return the connection, if present.
    pub async fn remove(&self, id: ClientId) -> Option<Connection> {
        self.inner.lock().await.connections.remove(&id)
    }

    pub async fn contains(&self, id: ClientId) -> bool {
        self.inner.lock().await.connections.contains_key(&id)
    }

    pub async fn count(&self) -> usize {
        self.inner.lock().await.connections.len()
    }

    /// Clone the outbound channel of a connection, if present.
    pub async fn sender(&self, id: ClientId) -> Option<mpsc::UnboundedSender<Message>> {
        self.inner
            .lock()
            .await
            .connections
            .get(&id)
            .map(|conn| conn.sender.clone())
    }

    /// Snapshot of all registered ids.
    pub async fn ids(&self) -> Vec<ClientId> {
        self.inner.lock().await.connections.keys().copied().collect()
    }
}
