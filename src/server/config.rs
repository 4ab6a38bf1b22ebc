//! Gateway server configuration.

/// Default maximum number of simultaneously connected producers.
pub const DEFAULT_MAX_CLIENTS: usize = 10;

/// Default maximum size of one assembled logical message in bytes.
///
/// Cover art may ride in the payload as base64, so the limit is generous.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Configuration for the gateway server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to bind to; 0 picks an ephemeral port
    pub port: u16,
    /// Whether producers connect over wss. TLS termination is not
    /// implemented; the flag is recorded on each connection only.
    pub secure: bool,
    /// Registry capacity; connection attempts beyond it receive 503
    pub max_clients: usize,
    /// Messages assembling beyond this size close the connection
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            secure: false,
            max_clients: DEFAULT_MAX_CLIENTS,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl ServerConfig {
    /// The address string the listener binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
