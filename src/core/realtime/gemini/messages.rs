//! Gemini Live API WebSocket message types.
//!
//! All messages are JSON objects with exactly one top-level key naming the
//! message kind.
//!
//! # Protocol Overview
//!
//! Client messages (sent to server):
//! - setup - Model, generation config, tools and transcription settings (first message)
//! - realtimeInput - Streaming audio/video chunks
//! - clientContent - A complete user text turn
//! - toolResponse - Results of function calls
//!
//! Server messages (received from server):
//! - setupComplete - Setup acknowledged
//! - serverContent - Model output, transcriptions, interruption and turn completion
//! - toolCall - Function calls the client must answer
//! - toolCallCancellation - Previously issued calls to drop
//! - goAway - The server will disconnect soon
//! - sessionResumptionUpdate - New resumable session handle

use base64::prelude::*;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::core::realtime::base::{FunctionDefinition, LiveEvent, TranscriptRole};

// =============================================================================
// Shared Content Types
// =============================================================================

/// Inline binary payload, base64 encoded on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

impl Blob {
    pub fn encode(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: BASE64_STANDARD.encode(bytes),
        }
    }
}

/// A single content part: text or inline data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    pub fn inline(blob: Blob) -> Self {
        Self {
            text: None,
            inline_data: Some(blob),
        }
    }
}

/// A role-tagged list of parts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts,
        }
    }
}

// =============================================================================
// Client Messages
// =============================================================================

/// Messages sent to the Live API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(Setup),
    RealtimeInput(RealtimeInput),
    ClientContent(ClientContent),
    ToolResponse(ToolResponse),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    /// Fully qualified model name (`models/...`)
    pub model: String,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    pub input_audio_transcription: AudioTranscriptionConfig,
    pub output_audio_transcription: AudioTranscriptionConfig,
    pub session_resumption: SessionResumptionConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub function_declarations: Vec<FunctionDefinition>,
}

/// Empty object enabling transcription.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AudioTranscriptionConfig {}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionResumptionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RealtimeInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<Blob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<Blob>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    pub turns: Vec<Content>,
    pub turn_complete: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub function_responses: Vec<FunctionResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub response: serde_json::Value,
}

// =============================================================================
// Server Messages
// =============================================================================

/// A message received from the Live API. Exactly one field is normally set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerMessage {
    pub setup_complete: Option<serde_json::Value>,
    pub server_content: Option<ServerContent>,
    pub tool_call: Option<ToolCall>,
    pub tool_call_cancellation: Option<ToolCallCancellation>,
    pub go_away: Option<GoAway>,
    pub session_resumption_update: Option<SessionResumptionUpdate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerContent {
    pub model_turn: Option<Content>,
    pub input_transcription: Option<Transcription>,
    pub output_transcription: Option<Transcription>,
    pub interrupted: bool,
    pub turn_complete: bool,
    pub generation_complete: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Transcription {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolCall {
    pub function_calls: Vec<FunctionCall>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FunctionCall {
    pub id: Option<String>,
    pub name: String,
    pub args: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ToolCallCancellation {
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoAway {
    pub time_left: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionResumptionUpdate {
    pub new_handle: Option<String>,
    pub resumable: bool,
}

impl ServerContent {
    /// Flatten into events: input transcription, model parts, output
    /// transcription, interruption, turn completion.
    pub fn into_events(self) -> Vec<LiveEvent> {
        let mut events = Vec::new();

        if let Some(text) = self.input_transcription.and_then(|t| t.text)
            && !text.is_empty()
        {
            events.push(LiveEvent::Text {
                role: TranscriptRole::User,
                text,
                partial: false,
            });
        }

        if let Some(turn) = self.model_turn {
            for part in turn.parts {
                if let Some(blob) = part.inline_data {
                    match BASE64_STANDARD.decode(blob.data.as_bytes()) {
                        Ok(bytes) if !bytes.is_empty() => {
                            events.push(LiveEvent::Audio(Bytes::from(bytes)))
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!("Failed to decode model audio: {}", e),
                    }
                }
                if let Some(text) = part.text
                    && !text.is_empty()
                {
                    events.push(LiveEvent::Text {
                        role: TranscriptRole::Assistant,
                        text,
                        partial: true,
                    });
                }
            }
        }

        if let Some(text) = self.output_transcription.and_then(|t| t.text)
            && !text.is_empty()
        {
            events.push(LiveEvent::Text {
                role: TranscriptRole::Assistant,
                text,
                partial: true,
            });
        }

        if self.interrupted {
            events.push(LiveEvent::Interrupted);
        }
        if self.turn_complete {
            events.push(LiveEvent::TurnComplete);
        }

        events
    }
}
