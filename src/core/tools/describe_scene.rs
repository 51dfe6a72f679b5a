//! Scene description tool.
//!
//! Gated on the per-turn intent flag and on frame freshness; the latest
//! frame is handed to the story generator through a temporary JPEG file.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use tempfile::TempPath;
use tokio::time::Instant;

use super::story::{SceneStoryGenerator, StoryError};
use super::{DeclineReason, LiveTool, ToolOutcome};
use crate::config::UserProfile;
use crate::core::intent::{DESCRIBE_PLACE_TOOL, IntentGate};
use crate::core::media::{Frame, FrameSlot};
use crate::core::realtime::FunctionDefinition;

/// Describes the place in the latest camera frame.
///
/// Runs only when the intent gate is open for the current turn and the
/// frame slot holds a frame no older than `freshness`.
pub struct DescribeSceneTool {
    gate: Arc<IntentGate>,
    slot: Arc<FrameSlot>,
    generator: Arc<dyn SceneStoryGenerator>,
    profile: UserProfile,
    freshness: Duration,
}

impl DescribeSceneTool {
    pub fn new(
        gate: Arc<IntentGate>,
        slot: Arc<FrameSlot>,
        generator: Arc<dyn SceneStoryGenerator>,
        profile: UserProfile,
        freshness: Duration,
    ) -> Self {
        Self {
            gate,
            slot,
            generator,
            profile,
            freshness,
        }
    }

    /// Check preconditions in order: intent first, then frame freshness.
    pub fn check_at(&self, now: Instant) -> Result<Frame, DeclineReason> {
        if !self.gate.is_open() {
            return Err(DeclineReason::IntentMissing);
        }
        match self.slot.get() {
            Some(frame) if frame.is_fresh_at(now, self.freshness) => Ok(frame),
            Some(frame) => {
                tracing::debug!(
                    "Latest frame is stale: age={:?} max={:?}",
                    frame.age_at(now),
                    self.freshness
                );
                Err(DeclineReason::NoFreshFrame)
            }
            None => Err(DeclineReason::NoFreshFrame),
        }
    }

    pub async fn describe(&self) -> ToolOutcome {
        let frame = match self.check_at(Instant::now()) {
            Ok(frame) => frame,
            Err(reason) => {
                tracing::info!("describe_place declined: {:?}", reason);
                return ToolOutcome::Declined(reason);
            }
        };

        match self.generate(frame.data).await {
            Ok(text) => ToolOutcome::Generated(text),
            Err(e) => {
                tracing::warn!("describe_place failed: {}", e);
                ToolOutcome::Failed(e.to_string())
            }
        }
    }

    async fn generate(&self, image: Bytes) -> Result<String, StoryError> {
        // Dropping the TempPath removes the file on every exit path.
        let path = write_temp_frame(image).await?;
        tracing::debug!("Frame written to {}", path.display());
        self.generator.generate(&path, &self.profile).await
    }
}

async fn write_temp_frame(image: Bytes) -> Result<TempPath, StoryError> {
    tokio::task::spawn_blocking(move || -> std::io::Result<TempPath> {
        let mut file = tempfile::Builder::new()
            .prefix("frame_")
            .suffix(".jpg")
            .tempfile()?;
        file.write_all(&image)?;
        file.flush()?;
        Ok(file.into_temp_path())
    })
    .await
    .map_err(|e| StoryError::Io(std::io::Error::other(e)))?
    .map_err(StoryError::Io)
}

#[async_trait]
impl LiveTool for DescribeSceneTool {
    fn declaration(&self) -> FunctionDefinition {
        FunctionDefinition {
            name: DESCRIBE_PLACE_TOOL.to_string(),
            description: Some(
                "Describe the place, building or landmark visible in the most recent camera \
                 frame. Call only when the user explicitly asks for it."
                    .to_string(),
            ),
            parameters: Some(json!({ "type": "object", "properties": {} })),
        }
    }

    async fn invoke(&self) -> ToolOutcome {
        self.describe().await
    }
}
