pub mod intent;
pub mod media;
pub mod realtime;
pub mod session;
pub mod tools;

// Re-export commonly used types for convenience
pub use intent::{DESCRIBE_PLACE_TOOL, IntentGate, matches_describe_intent};

pub use media::{Frame, FrameSlot, MediaChannel, PushOutcome, VideoChunk};

pub use realtime::{
    BaseRealtime, GeminiLive, LiveEvent, LiveRequestQueue, RealtimeConfig, RealtimeConnection,
    RealtimeError, RealtimeProvider, RealtimeResult, SharedRealtime, create_realtime_provider,
    get_supported_realtime_providers,
};

pub use session::{ClientLink, Session, SessionIds, SessionOutcome, TurnTracker};

pub use tools::{
    DescribeSceneTool, GeminiStoryGenerator, LiveTool, SceneStoryGenerator, ToolOutcome,
    ToolRegistry,
};
