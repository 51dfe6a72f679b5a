//! Live conversational engine module.
//!
//! This module provides the abstraction the session talks to and its Gemini
//! Live implementation.
//!
//! # Architecture
//!
//! - `BaseRealtime` trait for provider abstraction
//! - One `RealtimeConnection` per session: a request queue and an event stream
//! - Tools are registered per connection and executed by the engine side
//!
//! # Audio Format
//!
//! - Input: PCM 16-bit signed little-endian at 16kHz
//! - Output: PCM 16-bit signed little-endian at 24kHz
//!
//! # Example
//!
//! ```rust,ignore
//! use live_guide_gateway::core::realtime::{create_realtime_provider, RealtimeConfig};
//! use live_guide_gateway::core::tools::ToolRegistry;
//!
//! let engine = create_realtime_provider("gemini")?;
//! let mut conn = engine.connect(config, ToolRegistry::new()).await?;
//! conn.requests.send_audio(pcm, "audio/pcm;rate=16000").await?;
//! ```

mod base;
pub mod gemini;

use std::sync::Arc;

pub use base::{
    BaseRealtime, FunctionDefinition, LiveEvent, LiveEventStream, LiveRequest, LiveRequestQueue,
    RealtimeConfig, RealtimeConnection, RealtimeError, RealtimeResult, TranscriptRole,
};
pub use gemini::GeminiLive;

/// Shared engine handle.
pub type SharedRealtime = Arc<dyn BaseRealtime>;

/// Supported realtime providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealtimeProvider {
    /// Gemini Live API
    Gemini,
}

impl RealtimeProvider {
    /// Parse provider from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gemini" | "gemini_live" | "gemini-live" | "google" => Some(RealtimeProvider::Gemini),
            _ => None,
        }
    }
}

impl std::fmt::Display for RealtimeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RealtimeProvider::Gemini => write!(f, "gemini"),
        }
    }
}

/// Factory function to create a realtime provider.
pub fn create_realtime_provider(provider_type: &str) -> RealtimeResult<SharedRealtime> {
    match RealtimeProvider::parse(provider_type) {
        Some(RealtimeProvider::Gemini) => Ok(Arc::new(GeminiLive::new())),
        None => Err(RealtimeError::InvalidConfiguration(format!(
            "Unsupported realtime provider: {}. Supported providers: {}",
            provider_type,
            get_supported_realtime_providers().join(", ")
        ))),
    }
}

/// Get list of supported realtime providers.
pub fn get_supported_realtime_providers() -> Vec<&'static str> {
    vec!["gemini"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_realtime_provider() {
        assert!(create_realtime_provider("gemini").is_ok());
        assert!(create_realtime_provider("GEMINI").is_ok());

        match create_realtime_provider("openai") {
            Err(RealtimeError::InvalidConfiguration(msg)) => {
                assert!(msg.contains("gemini"));
            }
            _ => panic!("Expected InvalidConfiguration error"),
        }
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(
            RealtimeProvider::parse("gemini-live"),
            Some(RealtimeProvider::Gemini)
        );
        assert_eq!(RealtimeProvider::parse("invalid"), None);
        assert_eq!(RealtimeProvider::Gemini.to_string(), "gemini");
    }
}
