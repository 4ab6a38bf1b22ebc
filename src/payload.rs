//! Wire data model for producer payloads and activation control messages.
//!
//! Every payload field is optional and absence means "no update", never
//! "reset to default". The decoder must preserve that distinction; merging
//! partial updates into the current display state is the consumer's job.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when an assembled message cannot be decoded.
///
/// Scoped to a single message: the caller logs it and drops the message,
/// the connection stays open.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Playback state reported by a producer.
///
/// Serialized as an integer on the wire (0 = Nothing, 1 = Paused,
/// 2 = Playing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PlaybackState {
    Nothing,
    Paused,
    Playing,
}

impl TryFrom<u8> for PlaybackState {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PlaybackState::Nothing),
            1 => Ok(PlaybackState::Paused),
            2 => Ok(PlaybackState::Playing),
            other => Err(format!("invalid playback state: {}", other)),
        }
    }
}

impl From<PlaybackState> for u8 {
    fn from(state: PlaybackState) -> Self {
        match state {
            PlaybackState::Nothing => 0,
            PlaybackState::Paused => 1,
            PlaybackState::Playing => 2,
        }
    }
}

/// Information about the producing player itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Current playback position and state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<PlaybackState>,
    /// Elapsed playback time in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<f64>,
}

/// Metadata of the song currently playing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SongInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_number: Option<u32>,
    /// Song length in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Cover art, either embedded (base64) or referenced by path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CoverInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// One logical message pushed by the active producer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Payload {
    /// Echo of the token issued to the producer on activation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Frame counter, increments with every update from the producer.
    #[serde(default)]
    pub frame: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<PlayerInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playback: Option<PlaybackInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub song: Option<SongInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<CoverInfo>,
}

impl Payload {
    /// Decode one assembled message into a payload.
    ///
    /// Never panics on malformed input; the error is scoped to this
    /// message only.
    pub fn decode(bytes: &[u8]) -> Result<Payload, DecodeError> {
        let text = std::str::from_utf8(bytes)?;
        let payload = serde_json::from_str(text)?;
        Ok(payload)
    }
}

/// Server -> producer control message carrying the activation token.
///
/// `{"Token": "<token>"}` activates, `{"Token": null}` deactivates. The
/// `Token` key is always present so `null` reaches the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMessage {
    #[serde(rename = "Token")]
    pub token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_partial_payload_leaves_absent_fields_unset() {
        // given: a payload carrying only a frame counter and a song title
        let json = br#"{"Frame":1,"Song":{"Title":"T"}}"#;

        // when: decoding
        let payload = Payload::decode(json).unwrap();

        // then: present fields are set, everything else stays unset
        assert_eq!(payload.frame, 1);
        let song = payload.song.unwrap();
        assert_eq!(song.title.as_deref(), Some("T"));
        assert_eq!(song.album, None);
        assert_eq!(song.artist, None);
        assert_eq!(song.track_number, None);
        assert_eq!(song.length, None);
        assert!(payload.token.is_none());
        assert!(payload.player.is_none());
        assert!(payload.playback.is_none());
        assert!(payload.cover.is_none());
    }

    #[test]
    fn test_decode_empty_object_defaults_frame_to_zero() {
        // given: an empty JSON object
        let json = b"{}";

        // when: decoding
        let payload = Payload::decode(json).unwrap();

        // then: frame defaults to 0 and all optionals are unset
        assert_eq!(payload.frame, 0);
        assert!(payload.song.is_none());
    }

    #[test]
    fn test_decode_playback_state_integers() {
        // given: playback info with the integer state encoding
        let json = br#"{"Playback":{"State":2,"Elapsed":12.5}}"#;

        // when: decoding
        let payload = Payload::decode(json).unwrap();

        // then: the integer maps onto the enum
        let playback = payload.playback.unwrap();
        assert_eq!(playback.state, Some(PlaybackState::Playing));
        assert_eq!(playback.elapsed, Some(12.5));
    }

    #[test]
    fn test_decode_rejects_unknown_playback_state() {
        // given: a playback state outside the valid range
        let json = br#"{"Playback":{"State":7}}"#;

        // when: decoding
        let result = Payload::decode(json);

        // then: the message is rejected as a decode error
        assert!(matches!(result, Err(DecodeError::InvalidJson(_))));
    }

    #[test]
    fn test_decode_rejects_malformed_json() {
        // given: truncated JSON
        let json = br#"{"Frame":1,"#;

        // when: decoding
        let result = Payload::decode(json);

        // then: a decode error is returned, no panic
        assert!(matches!(result, Err(DecodeError::InvalidJson(_))));
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        // given: bytes that are not UTF-8
        let bytes = [0xff, 0xfe, 0xfd];

        // when: decoding
        let result = Payload::decode(&bytes);

        // then: a decode error is returned
        assert!(matches!(result, Err(DecodeError::InvalidUtf8(_))));
    }

    #[test]
    fn test_serialize_skips_absent_fields() {
        // given: a payload with only a song title set
        let payload = Payload {
            frame: 3,
            song: Some(SongInfo {
                title: Some("T".to_string()),
                ..SongInfo::default()
            }),
            ..Payload::default()
        };

        // when: serializing
        let json = serde_json::to_string(&payload).unwrap();

        // then: absent fields are omitted entirely
        assert_eq!(json, r#"{"Frame":3,"Song":{"Title":"T"}}"#);
    }

    #[test]
    fn test_token_message_roundtrip() {
        // given: activation and deactivation control messages
        let activate = TokenMessage {
            token: Some("abc".to_string()),
        };
        let deactivate = TokenMessage { token: None };

        // when: serializing both
        let activate_json = serde_json::to_string(&activate).unwrap();
        let deactivate_json = serde_json::to_string(&deactivate).unwrap();

        // then: the Token key is always present, null on deactivation
        assert_eq!(activate_json, r#"{"Token":"abc"}"#);
        assert_eq!(deactivate_json, r#"{"Token":null}"#);
        let parsed: TokenMessage = serde_json::from_str(&deactivate_json).unwrap();
        assert_eq!(parsed.token, None);
    }
}
