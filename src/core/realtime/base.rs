//! Base traits and types for live conversational engines.
//!
//! An engine connection is split into two halves:
//!
//! - [`LiveRequestQueue`]: bounded sender for realtime audio/video, typed text and close
//! - [`LiveEventStream`]: ordered stream of [`LiveEvent`]s (or a terminal error)
//!
//! Tool calls are executed by the engine connection itself against the
//! [`ToolRegistry`] handed to [`BaseRealtime::connect`], so the session never
//! awaits a tool on its own relay path.
//!
//! # Supported Providers
//!
//! - Gemini Live (BidiGenerateContent)

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::LiveConfig;
use crate::core::tools::ToolRegistry;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during realtime operations.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The provider closed an established connection
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Provider-specific error
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,
}

impl RealtimeError {
    /// Whether the error means the engine connection itself is gone.
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self,
            RealtimeError::ConnectionFailed(_)
                | RealtimeError::ConnectionClosed(_)
                | RealtimeError::WebSocketError(_)
                | RealtimeError::Timeout(_)
                | RealtimeError::NotConnected
        )
    }
}

impl From<serde_json::Error> for RealtimeError {
    fn from(e: serde_json::Error) -> Self {
        RealtimeError::SerializationError(e.to_string())
    }
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Configuration Types
// =============================================================================

/// Per-connection engine configuration.
#[derive(Debug, Clone, Default)]
pub struct RealtimeConfig {
    /// API key for authentication
    pub api_key: String,

    /// Model to use (e.g., "gemini-2.0-flash-exp")
    pub model: String,

    /// Prebuilt voice for audio output
    pub voice: String,

    /// System instructions for the assistant
    pub instructions: String,

    /// Sample rate tagged on forwarded PCM audio
    pub send_sample_rate: u32,

    /// Resumable session handle from a previous connection
    pub resume_handle: Option<String>,

    /// Endpoint override (tests, proxies)
    pub endpoint: Option<String>,
}

impl RealtimeConfig {
    /// Build from the server's live settings.
    pub fn from_live(live: &LiveConfig, api_key: String, resume_handle: Option<String>) -> Self {
        Self {
            api_key,
            model: live.model.clone(),
            voice: live.voice.clone(),
            instructions: live.instructions.clone(),
            send_sample_rate: live.send_sample_rate,
            resume_handle,
            endpoint: live.endpoint.clone(),
        }
    }
}

impl fmt::Display for RealtimeConfig {
    // Never print the key.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "model={} voice={} resume={}",
            self.model,
            self.voice,
            self.resume_handle.is_some()
        )
    }
}

/// Function definition for tool calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Function name
    pub name: String,
    /// Function description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema for parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

// =============================================================================
// Requests
// =============================================================================

/// Role of the speaker in a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    /// User speech or typed text
    User,
    /// Assistant output
    Assistant,
}

impl fmt::Display for TranscriptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptRole::User => write!(f, "user"),
            TranscriptRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message the session sends to the engine.
#[derive(Debug, Clone)]
pub enum LiveRequest {
    /// Realtime audio chunk
    Audio { data: Bytes, mime_type: String },
    /// Realtime video frame
    Video { data: Bytes, mime_type: String },
    /// Complete user text turn
    Text(String),
    /// Text for the model to read aloud; not part of the user's transcript
    SpeakText(String),
    /// Finish the conversation
    Close,
}

/// Sending half of an engine connection.
#[derive(Debug, Clone)]
pub struct LiveRequestQueue {
    tx: mpsc::Sender<LiveRequest>,
}

impl LiveRequestQueue {
    /// Create a queue and the receiver an engine drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<LiveRequest>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    async fn send(&self, request: LiveRequest) -> RealtimeResult<()> {
        self.tx
            .send(request)
            .await
            .map_err(|_| RealtimeError::NotConnected)
    }

    pub async fn send_audio(&self, data: Bytes, mime_type: impl Into<String>) -> RealtimeResult<()> {
        self.send(LiveRequest::Audio {
            data,
            mime_type: mime_type.into(),
        })
        .await
    }

    pub async fn send_video(&self, data: Bytes, mime_type: impl Into<String>) -> RealtimeResult<()> {
        self.send(LiveRequest::Video {
            data,
            mime_type: mime_type.into(),
        })
        .await
    }

    pub async fn send_text(&self, text: impl Into<String>) -> RealtimeResult<()> {
        self.send(LiveRequest::Text(text.into())).await
    }

    pub async fn send_speak_text(&self, text: impl Into<String>) -> RealtimeResult<()> {
        self.send(LiveRequest::SpeakText(text.into())).await
    }

    /// Ask the engine to finish. Never waits: a full queue is left to drain
    /// and the engine also stops once every sender is dropped.
    pub fn close(&self) {
        if let Err(e) = self.tx.try_send(LiveRequest::Close) {
            tracing::debug!("Close request not queued: {}", e);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// =============================================================================
// Events
// =============================================================================

/// An event emitted by the engine, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    /// Synthesized audio chunk
    Audio(Bytes),
    /// Transcript or response text
    Text {
        role: TranscriptRole,
        text: String,
        /// Incremental fragment rather than an aggregated final text
        partial: bool,
    },
    /// The model's current response was cut off by user input
    Interrupted,
    /// The model finished its turn
    TurnComplete,
    /// A resumable session handle update
    SessionResumption {
        handle: Option<String>,
        resumable: bool,
    },
    /// The engine invoked a tool
    ToolCall { name: String },
    /// The engine will close the connection soon
    GoAway { time_left: Option<String> },
}

/// Receiving half of an engine connection.
///
/// Yields `Err` once if the connection fails, then `None`.
#[derive(Debug)]
pub struct LiveEventStream {
    rx: mpsc::Receiver<RealtimeResult<LiveEvent>>,
}

impl LiveEventStream {
    /// Create a stream and the sender an engine feeds.
    pub fn channel(capacity: usize) -> (mpsc::Sender<RealtimeResult<LiveEvent>>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { rx })
    }

    pub async fn next(&mut self) -> Option<RealtimeResult<LiveEvent>> {
        self.rx.recv().await
    }
}

/// An established engine connection.
#[derive(Debug)]
pub struct RealtimeConnection {
    pub requests: LiveRequestQueue,
    pub events: LiveEventStream,
}

// =============================================================================
// Base Trait
// =============================================================================

/// Base trait for live conversational engines.
///
/// # Example
///
/// ```rust,ignore
/// use live_guide_gateway::core::realtime::{BaseRealtime, GeminiLive, RealtimeConfig};
/// use live_guide_gateway::core::tools::ToolRegistry;
///
/// let engine = GeminiLive::new();
/// let mut conn = engine.connect(config, ToolRegistry::new()).await?;
/// conn.requests.send_text("Hello").await?;
/// while let Some(event) = conn.events.next().await {
///     println!("{:?}", event?);
/// }
/// ```
#[async_trait]
pub trait BaseRealtime: Send + Sync {
    /// Open a live session. Returns once the engine has acknowledged setup.
    async fn connect(
        &self,
        config: RealtimeConfig,
        tools: ToolRegistry,
    ) -> RealtimeResult<RealtimeConnection>;

    /// Get provider information.
    fn get_provider_info(&self) -> serde_json::Value;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_role_display() {
        assert_eq!(TranscriptRole::User.to_string(), "user");
        assert_eq!(TranscriptRole::Assistant.to_string(), "assistant");
    }

    #[test]
    fn test_error_display() {
        let err = RealtimeError::ConnectionFailed("test".to_string());
        assert!(err.to_string().contains("Connection failed"));

        let err = RealtimeError::NotConnected;
        assert_eq!(err.to_string(), "Not connected");
    }

    #[test]
    fn test_connection_loss_classification() {
        assert!(RealtimeError::ConnectionClosed("bye".into()).is_connection_loss());
        assert!(RealtimeError::Timeout("setup".into()).is_connection_loss());
        assert!(RealtimeError::NotConnected.is_connection_loss());
        assert!(!RealtimeError::SerializationError("x".into()).is_connection_loss());
        assert!(!RealtimeError::ProviderError("x".into()).is_connection_loss());
    }

    #[test]
    fn test_config_display_hides_key() {
        let config = RealtimeConfig {
            api_key: "secret-key".to_string(),
            model: "m".to_string(),
            ..Default::default()
        };
        assert!(!config.to_string().contains("secret-key"));
    }

    #[tokio::test]
    async fn test_request_queue_reports_dropped_engine() {
        let (queue, rx) = LiveRequestQueue::channel(4);
        drop(rx);
        assert!(matches!(
            queue.send_text("hi").await,
            Err(RealtimeError::NotConnected)
        ));
        assert!(queue.is_closed());
    }

    #[tokio::test]
    async fn test_close_never_blocks_on_full_queue() {
        let (queue, mut rx) = LiveRequestQueue::channel(1);
        queue.send_text("fill").await.unwrap();
        queue.close();
        assert!(matches!(rx.recv().await, Some(LiveRequest::Text(t)) if t == "fill"));
    }
}
