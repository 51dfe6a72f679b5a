use std::path::PathBuf;
use std::str::FromStr;

use super::{ConfigError, Mobility, ServerConfig, TlsConfig, UserProfile};

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}

/// Build a configuration from environment variables layered over defaults.
pub(super) fn load_from_env() -> Result<ServerConfig, ConfigError> {
    let mut config = ServerConfig::default();

    if let Some(host) = env_var("HOST") {
        config.host = host;
    }
    if let Some(port) = parse_env::<u16>("PORT")? {
        config.port = port;
    }

    config.tls = match (env_var("TLS_CERT_PATH"), env_var("TLS_KEY_PATH")) {
        (Some(cert), Some(key)) => Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        }),
        (None, None) => None,
        _ => {
            return Err(ConfigError::Validation(
                "TLS_CERT_PATH and TLS_KEY_PATH must be set together".to_string(),
            ));
        }
    };

    config.providers.gemini_api_key = env_var("GEMINI_API_KEY").or_else(|| env_var("GOOGLE_API_KEY"));

    if let Some(model) = env_var("LIVE_MODEL") {
        config.live.model = model;
    }
    if let Some(voice) = env_var("LIVE_VOICE") {
        config.live.voice = voice;
    }
    if let Some(instructions) = env_var("LIVE_INSTRUCTIONS") {
        config.live.instructions = instructions;
    }
    if let Some(rate) = parse_env::<u32>("SEND_SAMPLE_RATE")? {
        config.live.send_sample_rate = rate;
    }
    if let Some(rate) = parse_env::<u32>("RECEIVE_SAMPLE_RATE")? {
        config.live.receive_sample_rate = rate;
    }
    config.live.endpoint = env_var("LIVE_ENDPOINT");

    if let Some(capacity) = parse_env::<usize>("AUDIO_QUEUE_CAPACITY")? {
        config.media.audio_queue_capacity = capacity;
    }
    if let Some(capacity) = parse_env::<usize>("VIDEO_QUEUE_CAPACITY")? {
        config.media.video_queue_capacity = capacity;
    }
    if let Some(ms) = parse_env::<u64>("FRAME_FRESHNESS_MS")? {
        config.media.frame_freshness_ms = ms;
    }

    if let Some(model) = env_var("STORY_MODEL") {
        config.story.model = model;
    }
    if let Some(secs) = parse_env::<u64>("STORY_TIMEOUT_SECONDS")? {
        config.story.timeout_seconds = secs;
    }
    config.story.endpoint = env_var("STORY_ENDPOINT");

    if let Some(locale) = env_var("PROFILE_LOCALE") {
        config.profile.locale = locale;
    }
    if let Some(interests) = env_var("PROFILE_INTERESTS") {
        config.profile.interests = UserProfile::parse_interests(&interests);
    }
    if let Some(mobility) = parse_env::<Mobility>("PROFILE_MOBILITY")? {
        config.profile.mobility = mobility;
    }

    config.cors_allowed_origins = env_var("CORS_ALLOWED_ORIGINS");
    config.max_websocket_connections = parse_env::<usize>("MAX_WEBSOCKET_CONNECTIONS")?;

    Ok(config)
}
