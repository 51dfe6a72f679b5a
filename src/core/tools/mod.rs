//! Tools the live engine may call during its own turn.
//!
//! A tool is a capability object: it declares itself to the engine and
//! answers [`LiveTool::invoke`] with a [`ToolOutcome`]. Failures are folded
//! into the outcome at the tool boundary and never reach the engine loop.

mod describe_scene;
mod story;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

pub use describe_scene::DescribeSceneTool;
pub use story::{GeminiStoryGenerator, SceneStoryGenerator, StoryError, strip_code_fences};

use crate::core::realtime::FunctionDefinition;

/// Spoken when the user has not asked for a scene description this turn.
pub const INTENT_MISSING_MESSAGE: &str = "I’m ready to describe a place when you ask. \
Say: 'Describe this place' or 'Run describe_place'.";

/// Spoken when there is no frame younger than the freshness threshold.
pub const NO_FRESH_FRAME_MESSAGE: &str = "I don’t have a fresh camera frame yet. \
Please show the place to the camera or send an image.";

/// Why a tool declined to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclineReason {
    IntentMissing,
    NoFreshFrame,
}

impl DeclineReason {
    pub fn message(&self) -> &'static str {
        match self {
            DeclineReason::IntentMissing => INTENT_MISSING_MESSAGE,
            DeclineReason::NoFreshFrame => NO_FRESH_FRAME_MESSAGE,
        }
    }
}

/// Result of a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// Text produced by the tool
    Generated(String),
    /// A precondition was not met
    Declined(DeclineReason),
    /// The tool ran and failed; carries the failure description
    Failed(String),
}

impl ToolOutcome {
    /// The string handed back to the engine.
    pub fn text(&self) -> String {
        match self {
            ToolOutcome::Generated(text) => text.clone(),
            ToolOutcome::Declined(reason) => reason.message().to_string(),
            ToolOutcome::Failed(reason) => format!("Sorry, I couldn't describe the place: {reason}"),
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, ToolOutcome::Generated(_))
    }
}

/// A capability exposed to the live engine.
#[async_trait]
pub trait LiveTool: Send + Sync {
    /// Declaration sent to the engine at setup.
    fn declaration(&self) -> FunctionDefinition;

    /// Run the tool. May take as long as the downstream call it wraps.
    async fn invoke(&self) -> ToolOutcome;
}

/// Name-indexed set of tools injected into an engine connection.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn LiveTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its declared name, replacing any previous one.
    pub fn register(&mut self, tool: Arc<dyn LiveTool>) {
        let name = tool.declaration().name;
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!("Replacing tool registration: {}", name);
        }
    }

    pub fn with(mut self, tool: Arc<dyn LiveTool>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn LiveTool>> {
        self.tools.get(name).cloned()
    }

    /// Declarations sorted by name.
    pub fn declarations(&self) -> Vec<FunctionDefinition> {
        let mut declarations: Vec<_> = self.tools.values().map(|t| t.declaration()).collect();
        declarations.sort_by(|a, b| a.name.cmp(&b.name));
        declarations
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.tools.keys().collect();
        names.sort();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}
