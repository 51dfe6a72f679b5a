use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{ConfigError, Mobility, ServerConfig, TlsConfig};

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present here
/// override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8765
///
/// providers:
///   gemini_api_key: "your-gemini-key"
///
/// live:
///   model: "gemini-2.0-flash-exp"
///   voice: "Puck"
///   send_sample_rate: 16000
///   receive_sample_rate: 24000
///
/// media:
///   audio_queue_capacity: 50
///   video_queue_capacity: 5
///   frame_freshness_ms: 3000
///
/// story:
///   model: "gemini-2.0-flash"
///   timeout_seconds: 90
///
/// profile:
///   interests: ["engineering_cars", "history"]
///   mobility: "standard"
///   locale: "en-US"
///
/// security:
///   cors_allowed_origins: "*"
///   max_websocket_connections: 200
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub providers: Option<ProvidersYaml>,
    pub live: Option<LiveYaml>,
    pub media: Option<MediaYaml>,
    pub story: Option<StoryYaml>,
    pub profile: Option<ProfileYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Provider API keys from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersYaml {
    pub gemini_api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LiveYaml {
    pub model: Option<String>,
    pub voice: Option<String>,
    pub instructions: Option<String>,
    pub send_sample_rate: Option<u32>,
    pub receive_sample_rate: Option<u32>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MediaYaml {
    pub audio_queue_capacity: Option<usize>,
    pub video_queue_capacity: Option<usize>,
    pub frame_freshness_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StoryYaml {
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProfileYaml {
    pub interests: Option<Vec<String>>,
    pub mobility: Option<Mobility>,
    pub locale: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub cors_allowed_origins: Option<String>,
    pub max_websocket_connections: Option<usize>,
}

impl YamlConfig {
    /// Read and parse a YAML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&contents)
    }

    /// Parse YAML configuration from a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Overlay the values present in this file onto `config`.
    pub fn apply(self, config: &mut ServerConfig) -> Result<(), ConfigError> {
        if let Some(server) = self.server {
            if let Some(host) = server.host {
                config.host = host;
            }
            if let Some(port) = server.port {
                config.port = port;
            }
            if let Some(tls) = server.tls {
                match tls.enabled {
                    Some(false) => config.tls = None,
                    _ => match (tls.cert_path, tls.key_path) {
                        (Some(cert), Some(key)) => {
                            config.tls = Some(TlsConfig {
                                cert_path: PathBuf::from(cert),
                                key_path: PathBuf::from(key),
                            })
                        }
                        (None, None) if tls.enabled.is_none() => {}
                        _ => {
                            return Err(ConfigError::Validation(
                                "server.tls requires both cert_path and key_path".to_string(),
                            ));
                        }
                    },
                }
            }
        }

        if let Some(providers) = self.providers
            && let Some(key) = providers.gemini_api_key
        {
            config.providers.gemini_api_key = Some(key);
        }

        if let Some(live) = self.live {
            if let Some(model) = live.model {
                config.live.model = model;
            }
            if let Some(voice) = live.voice {
                config.live.voice = voice;
            }
            if let Some(instructions) = live.instructions {
                config.live.instructions = instructions;
            }
            if let Some(rate) = live.send_sample_rate {
                config.live.send_sample_rate = rate;
            }
            if let Some(rate) = live.receive_sample_rate {
                config.live.receive_sample_rate = rate;
            }
            if live.endpoint.is_some() {
                config.live.endpoint = live.endpoint;
            }
        }

        if let Some(media) = self.media {
            if let Some(capacity) = media.audio_queue_capacity {
                config.media.audio_queue_capacity = capacity;
            }
            if let Some(capacity) = media.video_queue_capacity {
                config.media.video_queue_capacity = capacity;
            }
            if let Some(ms) = media.frame_freshness_ms {
                config.media.frame_freshness_ms = ms;
            }
        }

        if let Some(story) = self.story {
            if let Some(model) = story.model {
                config.story.model = model;
            }
            if let Some(secs) = story.timeout_seconds {
                config.story.timeout_seconds = secs;
            }
            if story.endpoint.is_some() {
                config.story.endpoint = story.endpoint;
            }
        }

        if let Some(profile) = self.profile {
            if let Some(interests) = profile.interests {
                config.profile.interests = interests;
            }
            if let Some(mobility) = profile.mobility {
                config.profile.mobility = mobility;
            }
            if let Some(locale) = profile.locale {
                config.profile.locale = locale;
            }
        }

        if let Some(security) = self.security {
            if security.cors_allowed_origins.is_some() {
                config.cors_allowed_origins = security.cors_allowed_origins;
            }
            if security.max_websocket_connections.is_some() {
                config.max_websocket_connections = security.max_websocket_connections;
            }
        }

        Ok(())
    }
}
