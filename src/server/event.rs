//! Events forwarded from the gateway to the owning application.
//!
//! The channel is the only outward crossing point: events are sent after
//! all internal locks are released, and the owning application consumes
//! them on its own task.

use tokio::sync::mpsc;

use crate::payload::Payload;

use super::registry::ClientId;

/// Event emitted by the gateway server.
#[derive(Debug)]
pub enum ServerEvent {
    /// A producer connected and was assigned an id
    ConnectionAccepted { id: ClientId },
    /// A connection was closed and removed from the registry
    ConnectionClosed { id: ClientId },
    /// The active producer pushed a payload
    DataReceived { id: ClientId, payload: Payload },
}

pub type EventSender = mpsc::UnboundedSender<ServerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ServerEvent>;

/// Create the event channel connecting the gateway to its owner.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
