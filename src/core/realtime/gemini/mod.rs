//! Gemini Live API module.
//!
//! Real-time audio/video conversation over Google's `BidiGenerateContent`
//! WebSocket API.
//!
//! # Features
//!
//! - Streaming audio and video input
//! - Synthesized audio output with a prebuilt voice
//! - Input and output transcription
//! - Function calling, answered by the connection task
//! - Session resumption handles

mod client;
mod config;
mod messages;

pub use client::GeminiLive;
pub use config::{
    GEMINI_API_BASE_URL, GEMINI_LIVE_URL, SETUP_TIMEOUT_SECS, VIDEO_MIME_TYPE, audio_mime_type,
    build_ws_url, qualified_model,
};
pub use messages::{
    Blob, ClientContent, ClientMessage, Content, FunctionCall, FunctionResponse, Part,
    RealtimeInput, ServerContent, ServerMessage, SessionResumptionUpdate, Setup, ToolCall,
    ToolResponse,
};
