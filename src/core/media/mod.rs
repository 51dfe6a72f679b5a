//! Per-session media plumbing.
//!
//! - [`MediaChannel`]: bounded drop-oldest queue, one for audio and one for video
//! - [`FrameSlot`]: latest video frame shared with the describe-scene tool

mod channel;
mod frame_slot;

pub use channel::{
    ChannelStats, DEFAULT_AUDIO_CAPACITY, DEFAULT_VIDEO_CAPACITY, MediaChannel, PushOutcome,
};
pub use frame_slot::{Frame, FrameSlot};

use bytes::Bytes;
use tokio::time::Instant;

/// Default video mode label when the client does not send one.
pub const DEFAULT_VIDEO_MODE: &str = "webcam";

/// A video chunk queued for the video worker.
#[derive(Debug, Clone)]
pub struct VideoChunk {
    pub data: Bytes,
    /// Capture source label (e.g. `webcam`, `screen`)
    pub mode: String,
    /// When the chunk arrived from the client; becomes the frame timestamp.
    pub received_at: Instant,
}
