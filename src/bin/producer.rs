//! Demo producer binary.
//!
//! Connects to the gateway like a media-player plugin would, waits for
//! its activation token, and pushes simulated playback frames.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin playcast-producer
//! cargo run --bin playcast-producer -- --url ws://127.0.0.1:3000/ --title "Song"
//! ```

use std::time::Duration;

use clap::Parser;
use playcast::{
    common::logger::setup_logger,
    producer::{ProducerOptions, SimulatedTrack, run_producer},
};

#[derive(Parser, Debug)]
#[command(name = "playcast-producer")]
#[command(about = "Simulated now-playing producer", long_about = None)]
struct Args {
    /// Gateway endpoint to connect to
    #[arg(short, long, default_value = "ws://127.0.0.1:8080/")]
    url: String,

    /// Player name reported to the display
    #[arg(long, default_value = "playcast-producer")]
    player: String,

    /// Title of the simulated track
    #[arg(long, default_value = "Demo Track")]
    title: String,

    /// Artist of the simulated track
    #[arg(long, default_value = "Demo Artist")]
    artist: String,

    /// Album of the simulated track
    #[arg(long, default_value = "Demo Album")]
    album: String,

    /// Track length in seconds
    #[arg(long, default_value_t = 180.0)]
    length: f64,

    /// Delay between frames in milliseconds
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Stop after this many frames (keeps going by default)
    #[arg(long)]
    frames: Option<u32>,
}

#[tokio::main]
async fn main() {
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();
    let options = ProducerOptions {
        url: args.url,
        player: args.player,
        track: SimulatedTrack {
            title: args.title,
            artist: args.artist,
            album: args.album,
            length: args.length,
        },
        interval: Duration::from_millis(args.interval_ms),
        max_frames: args.frames,
    };

    if let Err(e) = run_producer(options).await {
        tracing::error!("producer error: {}", e);
        std::process::exit(1);
    }
}
