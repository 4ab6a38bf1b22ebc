//! Error types for the gateway server and the producer client.

use thiserror::Error;

/// Server-side errors.
///
/// `Bind` is fatal to a single `start` attempt and leaves the server
/// stopped; it is logged, never raised across the lifecycle API.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not bind to the configured address
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// The accept loop failed while serving
    #[error("serve error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Producer-side errors.
#[derive(Debug, Error)]
pub enum ProducerError {
    /// The WebSocket handshake was rejected or failed
    #[error("connection error: {0}")]
    Connection(String),

    /// The gateway closed the connection
    #[error("connection closed by the gateway: {0}")]
    Closed(String),
}
