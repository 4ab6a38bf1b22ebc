//! Now-playing gateway server binary.
//!
//! Runs the WebSocket gateway and plays the display side: elects the
//! first producer that connects, merges partial payload updates into the
//! current now-playing state, and logs it.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin playcast-server
//! cargo run --bin playcast-server -- --host 0.0.0.0 --port 3000
//! ```

use clap::Parser;
use playcast::{
    common::logger::setup_logger,
    payload::{Payload, PlaybackState},
    server::{
        DEFAULT_MAX_CLIENTS, DEFAULT_MAX_MESSAGE_SIZE, Server, ServerConfig, ServerEvent,
        event_channel,
    },
};

#[derive(Parser, Debug)]
#[command(name = "playcast-server")]
#[command(about = "Now-playing display gateway over WebSocket", long_about = None)]
struct Args {
    /// Host address to bind the gateway to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the gateway to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Maximum number of simultaneously connected producers
    #[arg(long, default_value_t = DEFAULT_MAX_CLIENTS)]
    max_clients: usize,

    /// Maximum size of one message in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
    max_message_size: usize,

    /// Reserved: expect wss producers (TLS termination not implemented)
    #[arg(long, default_value_t = false)]
    secure: bool,
}

/// Display-side view of the playback state.
///
/// Merging partial updates is the consumer's job: a payload section that
/// is absent leaves the current value untouched, while fields absent
/// inside a present section fall back to their defaults.
#[derive(Default)]
struct NowPlaying {
    title: String,
    artist: String,
    album: String,
    state: Option<PlaybackState>,
    elapsed: f64,
    length: f64,
}

impl NowPlaying {
    fn apply(&mut self, payload: &Payload) {
        if let Some(song) = &payload.song {
            self.title = song.title.clone().unwrap_or_default();
            self.artist = song.artist.clone().unwrap_or_default();
            self.album = song.album.clone().unwrap_or_default();
            self.length = song.length.unwrap_or_default();
        }
        if let Some(playback) = &payload.playback {
            if let Some(state) = playback.state {
                self.state = Some(state);
            }
            if let Some(elapsed) = playback.elapsed {
                self.elapsed = elapsed;
            }
        }
    }

    fn describe(&self) -> String {
        let state = match self.state {
            Some(PlaybackState::Playing) => "playing",
            Some(PlaybackState::Paused) => "paused",
            _ => "nothing",
        };
        format!(
            "[{}] {} - {} ({:.0}/{:.0}s)",
            state, self.artist, self.title, self.elapsed, self.length
        )
    }
}

#[tokio::main]
async fn main() {
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        secure: args.secure,
        max_clients: args.max_clients,
        max_message_size: args.max_message_size,
    };

    let (events_tx, mut events) = event_channel();
    let server = Server::new(config, events_tx);

    server.start().await;
    if !server.is_running().await {
        std::process::exit(1);
    }
    tracing::info!("press Ctrl+C to shutdown gracefully");

    let mut now_playing = NowPlaying::default();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown requested");
                server.stop().await;
                break;
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    ServerEvent::ConnectionAccepted { id } => {
                        // First producer to connect wins the election.
                        if server.active_client_id().await.is_none() {
                            tracing::info!("setting active client to #{}", id);
                            server.set_active_client_id(Some(id)).await;
                        }
                    }
                    ServerEvent::ConnectionClosed { id } => {
                        tracing::info!("client #{} disconnected", id);
                    }
                    ServerEvent::DataReceived { id, payload } => {
                        now_playing.apply(&payload);
                        tracing::info!("client #{} frame {}: {}", id, payload.frame, now_playing.describe());
                    }
                }
            }
        }
    }

    tracing::info!("server shutdown complete");
}
