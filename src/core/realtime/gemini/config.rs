//! Gemini Live API configuration constants and URL helpers.

/// Base URL of the Generative Language REST API.
pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini Live WebSocket endpoint (API key is appended as `key`).
pub const GEMINI_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// MIME type of forwarded video frames.
pub const VIDEO_MIME_TYPE: &str = "image/jpeg";

/// Seconds to wait for `setupComplete` after sending `setup`.
pub const SETUP_TIMEOUT_SECS: u64 = 10;

/// MIME type of PCM audio at `sample_rate`.
pub fn audio_mime_type(sample_rate: u32) -> String {
    format!("audio/pcm;rate={sample_rate}")
}

/// Model names must be fully qualified on the wire.
pub fn qualified_model(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

/// WebSocket URL for `endpoint` (or the public endpoint) with the key attached.
pub fn build_ws_url(endpoint: Option<&str>, api_key: &str) -> Result<url::Url, url::ParseError> {
    let mut url = url::Url::parse(endpoint.unwrap_or(GEMINI_LIVE_URL))?;
    if !api_key.is_empty() {
        url.query_pairs_mut().append_pair("key", api_key);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_mime_type() {
        assert_eq!(audio_mime_type(16000), "audio/pcm;rate=16000");
    }

    #[test]
    fn test_qualified_model() {
        assert_eq!(qualified_model("gemini-2.0-flash-exp"), "models/gemini-2.0-flash-exp");
        assert_eq!(qualified_model("models/x"), "models/x");
    }

    #[test]
    fn test_build_ws_url() {
        let url = build_ws_url(None, "abc").unwrap();
        assert!(url.as_str().starts_with("wss://generativelanguage.googleapis.com/ws/"));
        assert!(url.as_str().ends_with("BidiGenerateContent?key=abc"));

        let url = build_ws_url(Some("ws://127.0.0.1:9001/live"), "k").unwrap();
        assert_eq!(url.as_str(), "ws://127.0.0.1:9001/live?key=k");
    }
}
