//! Live WebSocket message types
//!
//! JSON objects exchanged with the browser client, one per WebSocket text
//! frame, discriminated by `type`. Media payloads travel base64-encoded in
//! `data`.

use serde::{Deserialize, Serialize};

use crate::core::media::DEFAULT_VIDEO_MODE;

/// Maximum allowed size for text messages (50 KB)
pub const MAX_TEXT_SIZE: usize = 50 * 1024;

/// Instruction prepended to `speak_text` payloads.
pub const SPEAK_TEXT_PREFIX: &str =
    "Read the following verbatim and do not add anything else: ";

/// Payload of the `interrupted` event.
pub const INTERRUPTED_MESSAGE: &str = "Response interrupted by user input";

fn default_video_mode() -> String {
    DEFAULT_VIDEO_MODE.to_string()
}

// =============================================================================
// Incoming Messages (Client -> Server)
// =============================================================================

/// Incoming WebSocket messages from the client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveIncomingMessage {
    /// Microphone chunk
    Audio {
        /// Base64-encoded PCM
        data: String,
    },

    /// Camera or screen frame
    Video {
        /// Base64-encoded JPEG
        data: String,
        #[serde(default = "default_video_mode")]
        mode: String,
    },

    /// Typed user message, forwarded verbatim
    Text { data: String },

    /// Text the assistant should read aloud
    SpeakText { data: String },

    /// Client is done; informational only
    End,
}

impl LiveIncomingMessage {
    /// Wire name of the message type, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            LiveIncomingMessage::Audio { .. } => "audio",
            LiveIncomingMessage::Video { .. } => "video",
            LiveIncomingMessage::Text { .. } => "text",
            LiveIncomingMessage::SpeakText { .. } => "speak_text",
            LiveIncomingMessage::End => "end",
        }
    }

    /// Validates message field sizes to prevent resource exhaustion attacks.
    ///
    /// Media payloads are bounded by the WebSocket message limit.
    pub fn validate_size(&self) -> Result<(), LiveValidationError> {
        match self {
            LiveIncomingMessage::Text { data } | LiveIncomingMessage::SpeakText { data } => {
                let size = data.len();
                if size > MAX_TEXT_SIZE {
                    return Err(LiveValidationError::TextTooLarge {
                        size,
                        max: MAX_TEXT_SIZE,
                    });
                }
            }
            LiveIncomingMessage::Audio { .. }
            | LiveIncomingMessage::Video { .. }
            | LiveIncomingMessage::End => {}
        }
        Ok(())
    }
}

/// Validation errors for incoming messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveValidationError {
    /// Text content exceeds maximum allowed size
    TextTooLarge { size: usize, max: usize },
}

impl std::fmt::Display for LiveValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TextTooLarge { size, max } => {
                write!(f, "Text too large: {} bytes (max: {} bytes)", size, max)
            }
        }
    }
}

impl std::error::Error for LiveValidationError {}

// =============================================================================
// Outgoing Messages (Server -> Client)
// =============================================================================

/// Outgoing WebSocket messages to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveOutgoingMessage {
    /// Handshake complete
    Ready,

    /// Synthesized audio, base64-encoded PCM
    Audio { data: String },

    /// Partial response text
    Text { data: String },

    /// The current turn was interrupted
    Interrupted { data: String },

    /// Turn finished; carries the resumable handle when one is known
    TurnComplete { session_id: Option<String> },

    /// A new resumable session handle
    SessionId { data: String },

    /// Stable error code
    Error { data: String },
}

/// Routes for the WebSocket sender task
#[derive(Debug)]
pub enum LiveMessageRoute {
    Outgoing(LiveOutgoingMessage),
    Close,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_incoming() {
        let msg: LiveIncomingMessage =
            serde_json::from_str(r#"{"type":"video","data":"AAEC"}"#).unwrap();
        assert_eq!(
            msg,
            LiveIncomingMessage::Video {
                data: "AAEC".to_string(),
                mode: "webcam".to_string()
            }
        );

        let msg: LiveIncomingMessage =
            serde_json::from_str(r#"{"type":"video","data":"AAEC","mode":"screen"}"#).unwrap();
        assert!(matches!(msg, LiveIncomingMessage::Video { ref mode, .. } if mode == "screen"));

        let msg: LiveIncomingMessage =
            serde_json::from_str(r#"{"type":"speak_text","data":"hi"}"#).unwrap();
        assert_eq!(msg.kind(), "speak_text");

        let msg: LiveIncomingMessage = serde_json::from_str(r#"{"type":"end"}"#).unwrap();
        assert_eq!(msg, LiveIncomingMessage::End);
    }

    #[test]
    fn test_parse_rejects_unknown_and_missing_fields() {
        assert!(serde_json::from_str::<LiveIncomingMessage>(r#"{"type":"dance"}"#).is_err());
        assert!(serde_json::from_str::<LiveIncomingMessage>(r#"{"type":"audio"}"#).is_err());
        assert!(serde_json::from_str::<LiveIncomingMessage>(r#"{"data":"x"}"#).is_err());
    }

    #[test]
    fn test_validate_size() {
        let ok = LiveIncomingMessage::Text {
            data: "a".repeat(MAX_TEXT_SIZE),
        };
        assert!(ok.validate_size().is_ok());

        let too_big = LiveIncomingMessage::SpeakText {
            data: "a".repeat(MAX_TEXT_SIZE + 1),
        };
        let err = too_big.validate_size().unwrap_err();
        assert!(err.to_string().contains("Text too large"));
    }

    #[test]
    fn test_outgoing_wire_format() {
        let json = serde_json::to_value(LiveOutgoingMessage::Ready).unwrap();
        assert_eq!(json, serde_json::json!({"type": "ready"}));

        let json = serde_json::to_value(LiveOutgoingMessage::TurnComplete { session_id: None })
            .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "turn_complete", "session_id": null})
        );

        let json = serde_json::to_value(LiveOutgoingMessage::SessionId {
            data: "h1".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"type": "session_id", "data": "h1"}));

        let json = serde_json::to_value(LiveOutgoingMessage::Error {
            data: "server_error".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "error");
    }
}
