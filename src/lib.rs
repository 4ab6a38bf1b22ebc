//! Now-playing display gateway library.
//!
//! Media-player producers connect over WebSocket and push structured
//! playback state to a display process. Exactly one producer is "active"
//! at a time; the server elects it and hands it an opaque token that
//! authorizes it to push updates.

pub mod error;
pub mod payload;
pub mod producer;
pub mod server;

// shared library
pub mod common;
