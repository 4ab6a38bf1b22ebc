//! Producer-side client session.
//!
//! Plays the role of a media-player plugin: connects to the gateway,
//! waits for its activation token, then pushes simulated playback frames
//! until it is deactivated or the connection ends.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use crate::error::ProducerError;
use crate::payload::{Payload, PlaybackInfo, PlaybackState, PlayerInfo, SongInfo, TokenMessage};

/// Track metadata announced by the simulated producer.
#[derive(Debug, Clone)]
pub struct SimulatedTrack {
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Length in seconds
    pub length: f64,
}

/// Options for one producer session.
#[derive(Debug, Clone)]
pub struct ProducerOptions {
    /// Gateway endpoint, e.g. `ws://127.0.0.1:8080/`
    pub url: String,
    /// Player name reported in the first frame
    pub player: String,
    pub track: SimulatedTrack,
    /// Delay between pushed frames
    pub interval: Duration,
    /// Stop after this many frames; `None` keeps pushing until closed
    pub max_frames: Option<u32>,
}

/// Run the producer session to completion.
pub async fn run_producer(options: ProducerOptions) -> Result<(), ProducerError> {
    let (ws_stream, _response) = connect_async(&options.url)
        .await
        .map_err(|e| ProducerError::Connection(e.to_string()))?;
    tracing::info!("connected to gateway at {}", options.url);

    let (mut write, mut read) = ws_stream.split();
    let mut token: Option<String> = None;
    let mut frame: u32 = 0;
    let mut elapsed = 0.0;
    let mut ticker = tokio::time::interval(options.interval);

    loop {
        tokio::select! {
            incoming = read.next() => {
                match incoming {
                    None => return Err(ProducerError::Closed("gateway went away".to_string())),
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<TokenMessage>(text.as_str()) {
                            Ok(TokenMessage { token: Some(issued) }) => {
                                tracing::info!("activated by the gateway");
                                token = Some(issued);
                                frame = 0;
                                elapsed = 0.0;
                            }
                            Ok(TokenMessage { token: None }) => {
                                tracing::info!("deactivated by the gateway");
                                token = None;
                            }
                            Err(e) => tracing::warn!("unrecognized control message: {}", e),
                        }
                    }
                    Some(Ok(Message::Close(close))) => {
                        tracing::info!("gateway closed the connection: {:?}", close);
                        return Ok(());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(ProducerError::Connection(e.to_string())),
                }
            }
            _ = ticker.tick() => {
                // Only the active producer pushes.
                let Some(current) = token.as_deref() else { continue; };

                let payload = build_frame(&options, current, frame, elapsed);
                let json = match serde_json::to_string(&payload) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!("failed to serialize payload: {}", e);
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Text(json.into())).await {
                    return Err(ProducerError::Connection(e.to_string()));
                }

                frame += 1;
                elapsed += options.interval.as_secs_f64();

                if options.max_frames.is_some_and(|max| frame >= max) {
                    tracing::info!("pushed {} frames, leaving", frame);
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
            }
        }
    }
}

/// Build one payload frame.
///
/// The first frame after activation carries the full player and song
/// metadata; later frames only tick the playback position, relying on
/// the gateway's partial-update semantics.
fn build_frame(options: &ProducerOptions, token: &str, frame: u32, elapsed: f64) -> Payload {
    let mut payload = Payload {
        token: Some(token.to_string()),
        frame,
        playback: Some(PlaybackInfo {
            state: Some(PlaybackState::Playing),
            elapsed: Some(elapsed),
        }),
        ..Payload::default()
    };

    if frame == 0 {
        payload.player = Some(PlayerInfo {
            name: Some(options.player.clone()),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
        });
        payload.song = Some(SongInfo {
            title: Some(options.track.title.clone()),
            artist: Some(options.track.artist.clone()),
            album: Some(options.track.album.clone()),
            length: Some(options.track.length),
            ..SongInfo::default()
        });
    }

    payload
}
