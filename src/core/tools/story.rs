//! Scene story generation.
//!
//! A one-shot `generateContent` call that turns a camera frame and the
//! listener's profile into a short spoken description.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{StoryConfig, UserProfile};
use crate::core::realtime::gemini::{Blob, Content, GEMINI_API_BASE_URL, Part};

/// Errors from the scene story collaborator.
#[derive(Debug, Error)]
pub enum StoryError {
    #[error("missing API key")]
    MissingApiKey,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("story generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("story generator returned no text")]
    EmptyResponse,
}

/// Produces a plain-text scene description for an image.
#[async_trait]
pub trait SceneStoryGenerator: Send + Sync {
    async fn generate(&self, image: &Path, profile: &UserProfile) -> Result<String, StoryError>;
}

static OPENING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```[a-zA-Z0-9_-]*\s*").unwrap());
static CLOSING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*```$").unwrap());

/// Remove a Markdown code fence wrapping the whole answer.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let without_open = OPENING_FENCE.replace(trimmed, "");
    CLOSING_FENCE.replace(&without_open, "").trim().to_string()
}

const STORY_PROMPT: &str = "You are a city guide. Look at the photo, identify the place, \
building or landmark, and tell a short, vivid story about it for the listener described \
in the JSON profile below. Favour the listener's interests in order, respect their \
mobility when suggesting anything nearby, and answer in the profile's locale. \
Reply with plain spoken text only: no Markdown, no lists, no JSON.";

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateContentResponse {
    /// Text parts of the first candidate, concatenated.
    fn first_text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Scene stories via Gemini `generateContent`.
pub struct GeminiStoryGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl GeminiStoryGenerator {
    pub fn new(api_key: impl Into<String>, config: &StoryConfig) -> Result<Self, StoryError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(StoryError::MissingApiKey);
        }
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config
                .endpoint
                .clone()
                .unwrap_or_else(|| GEMINI_API_BASE_URL.to_string()),
            timeout: config.timeout(),
        })
    }

    fn request_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    async fn request(&self, body: &GenerateContentRequest) -> Result<String, StoryError> {
        let response = self
            .client
            .post(self.request_url())
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoryError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        Ok(parsed.first_text())
    }
}

#[async_trait]
impl SceneStoryGenerator for GeminiStoryGenerator {
    async fn generate(&self, image: &Path, profile: &UserProfile) -> Result<String, StoryError> {
        let bytes = tokio::fs::read(image).await?;
        let profile_json = serde_json::to_string(profile)
            .map_err(|e| StoryError::Io(std::io::Error::other(e)))?;

        let body = GenerateContentRequest {
            contents: vec![Content::user(vec![
                Part::inline(Blob::encode("image/jpeg", &bytes)),
                Part::text(format!("{STORY_PROMPT}\n\nProfile: {profile_json}")),
            ])],
        };

        tracing::info!(
            model = %self.model,
            image_bytes = bytes.len(),
            locale = %profile.locale,
            "Generating scene story"
        );

        let text = tokio::time::timeout(self.timeout, self.request(&body))
            .await
            .map_err(|_| StoryError::Timeout(self.timeout))??;

        let story = strip_code_fences(&text);
        if story.is_empty() {
            return Err(StoryError::EmptyResponse);
        }
        Ok(story)
    }
}
