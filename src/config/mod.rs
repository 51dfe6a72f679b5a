//! Configuration module for the Live Guide gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `env`: Environment variable loading
//! - `yaml`: YAML configuration file loading
//! - `profile`: User profile handed to the scene story generator
//!
//! # Example
//! ```rust,no_run
//! use live_guide_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

mod env;
mod profile;
mod yaml;

pub use profile::{Mobility, UserProfile};
pub use yaml::YamlConfig;

use crate::core::media::{DEFAULT_AUDIO_CAPACITY, DEFAULT_VIDEO_CAPACITY};

/// Default Gemini Live model
pub const DEFAULT_LIVE_MODEL: &str = "gemini-2.0-flash-exp";

/// Default prebuilt voice
pub const DEFAULT_VOICE: &str = "Puck";

/// Sample rate of PCM audio forwarded to the engine
pub const DEFAULT_SEND_SAMPLE_RATE: u32 = 16000;

/// Sample rate of PCM audio produced by the engine
pub const DEFAULT_RECEIVE_SAMPLE_RATE: u32 = 24000;

/// Maximum age of a frame eligible for scene description
pub const DEFAULT_FRAME_FRESHNESS_MS: u64 = 3000;

/// Default model for one-shot scene stories
pub const DEFAULT_STORY_MODEL: &str = "gemini-2.0-flash";

/// Upper bound on a single scene story generation
pub const DEFAULT_STORY_TIMEOUT_SECONDS: u64 = 90;

/// Default system instruction for the live conversation.
pub const DEFAULT_INSTRUCTIONS: &str = "\
You are a friendly, knowledgeable travel assistant helping users explore cities, \
landmarks and attractions. You have a tool `describe_place()` (no arguments) that \
returns a description of the place visible in the most recent camera frame. \
Call it only when the user explicitly asks you to describe or identify a place, \
building or landmark, or asks you to run describe_place. Do not call it for \
greetings, small talk, general travel advice, or when the user names a place \
without showing it. If the user has not shown anything yet, ask them to point \
the camera at the place first.";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Provider credentials. Zeroized on drop.
#[derive(Debug, Clone, Default)]
pub struct ProvidersConfig {
    /// Google AI Studio key used for both Gemini Live and scene stories
    pub gemini_api_key: Option<String>,
}

impl Drop for ProvidersConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.gemini_api_key {
            key.zeroize();
        }
    }
}

/// Live conversation settings
#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub model: String,
    pub voice: String,
    pub instructions: String,
    /// Rate tagged on audio chunks forwarded to the engine
    pub send_sample_rate: u32,
    /// Rate of audio chunks relayed back to the client
    pub receive_sample_rate: u32,
    /// Override for the Live WebSocket endpoint (tests, proxies)
    pub endpoint: Option<String>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_LIVE_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            send_sample_rate: DEFAULT_SEND_SAMPLE_RATE,
            receive_sample_rate: DEFAULT_RECEIVE_SAMPLE_RATE,
            endpoint: None,
        }
    }
}

/// Scene story generation settings
#[derive(Debug, Clone)]
pub struct StoryConfig {
    pub model: String,
    pub timeout_seconds: u64,
    /// Override for the generateContent base URL (tests, proxies)
    pub endpoint: Option<String>,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_STORY_MODEL.to_string(),
            timeout_seconds: DEFAULT_STORY_TIMEOUT_SECONDS,
            endpoint: None,
        }
    }
}

impl StoryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Per-session media buffering settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConfig {
    pub audio_queue_capacity: usize,
    pub video_queue_capacity: usize,
    pub frame_freshness_ms: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            audio_queue_capacity: DEFAULT_AUDIO_CAPACITY,
            video_queue_capacity: DEFAULT_VIDEO_CAPACITY,
            frame_freshness_ms: DEFAULT_FRAME_FRESHNESS_MS,
        }
    }
}

impl MediaConfig {
    pub fn frame_freshness(&self) -> Duration {
        Duration::from_millis(self.frame_freshness_ms)
    }
}

/// Server configuration
///
/// Contains all configuration needed to run the gateway:
/// - Server settings (host, port, TLS)
/// - Provider credentials
/// - Live conversation, media buffering and scene story settings
/// - The user profile passed to every session
/// - Security settings (CORS, connection limits)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    pub providers: ProvidersConfig,
    pub live: LiveConfig,
    pub story: StoryConfig,
    pub media: MediaConfig,
    pub profile: UserProfile,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,
    /// Maximum concurrent WebSocket sessions
    /// Default: None (unlimited)
    pub max_websocket_connections: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8765,
            tls: None,
            providers: ProvidersConfig::default(),
            live: LiveConfig::default(),
            story: StoryConfig::default(),
            media: MediaConfig::default(),
            profile: UserProfile::default(),
            cors_allowed_origins: None,
            max_websocket_connections: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables (with defaults).
    ///
    /// The .env file is loaded in `main.rs` before this is called.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = env::load_from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml_config = YamlConfig::from_file(path)?;
        let mut config = env::load_from_env()?;
        yaml_config.apply(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Gemini API key, if configured
    pub fn gemini_api_key(&self) -> Option<&str> {
        self.providers.gemini_api_key.as_deref()
    }

    /// Reject values that would make sessions unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.media.audio_queue_capacity == 0 {
            return Err(ConfigError::Validation(
                "audio_queue_capacity must be greater than zero".to_string(),
            ));
        }
        if self.media.video_queue_capacity == 0 {
            return Err(ConfigError::Validation(
                "video_queue_capacity must be greater than zero".to_string(),
            ));
        }
        if self.media.frame_freshness_ms == 0 {
            return Err(ConfigError::Validation(
                "frame_freshness_ms must be greater than zero".to_string(),
            ));
        }
        if self.story.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "story timeout_seconds must be greater than zero".to_string(),
            ));
        }
        if self.live.send_sample_rate == 0 || self.live.receive_sample_rate == 0 {
            return Err(ConfigError::Validation(
                "sample rates must be greater than zero".to_string(),
            ));
        }
        if let Some(0) = self.max_websocket_connections {
            return Err(ConfigError::Validation(
                "max_websocket_connections must be greater than zero when set".to_string(),
            ));
        }
        Ok(())
    }
}
