//! Shared slot holding the most recent video frame.
//!
//! Written by the video worker on every frame and read by the
//! describe-scene tool. Access is serialized by a short-lived lock held only
//! for the swap or the copy; frame payloads are reference-counted `Bytes`, so
//! a read is a cheap clone and never a torn write.

use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::time::Instant;

/// A captured frame and the instant it was stored.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Bytes,
    pub captured_at: Instant,
}

impl Frame {
    /// Age of the frame relative to `now`.
    pub fn age_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.captured_at)
    }

    /// Whether the frame is at most `max_age` old at `now`.
    pub fn is_fresh_at(&self, now: Instant, max_age: Duration) -> bool {
        self.age_at(now) <= max_age
    }
}

/// Single-writer, multi-reader holder of the latest frame.
#[derive(Debug, Default)]
pub struct FrameSlot {
    latest: Mutex<Option<Frame>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held frame.
    pub fn set(&self, data: Bytes, captured_at: Instant) {
        let frame = Frame { data, captured_at };
        *self.latest.lock() = Some(frame);
    }

    /// Most recent frame, if any. Never waits on the writer beyond the swap.
    pub fn get(&self) -> Option<Frame> {
        self.latest.lock().clone()
    }

    /// Whether a frame has ever been stored.
    pub fn is_empty(&self) -> bool {
        self.latest.lock().is_none()
    }
}
