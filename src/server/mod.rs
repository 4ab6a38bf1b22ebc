//! Now-playing gateway server: connection registry, single-active-producer
//! election, per-connection read loops, and lifecycle management.

mod activation;
mod config;
mod event;
mod handler;
mod registry;
mod runner;
mod session;
mod state;

pub use config::{DEFAULT_MAX_CLIENTS, DEFAULT_MAX_MESSAGE_SIZE, ServerConfig};
pub use event::{EventReceiver, EventSender, ServerEvent, event_channel};
pub use registry::ClientId;
pub use runner::Server;
