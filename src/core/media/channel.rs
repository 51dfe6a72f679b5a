//! Bounded media channel with drop-oldest admission.
//!
//! Real-time media prefers freshness over completeness: when a channel is
//! full, the oldest queued chunk is evicted to make room for the new one, so
//! `push` never waits on the consumer. `pop` suspends the draining worker
//! until a chunk arrives or the channel is shut down.
//!
//! Shutdown is signalled with [`MediaChannel::close`], which acts as the
//! sentinel: the worker drains whatever was already queued, then `pop`
//! returns `None`. Chunks pushed after the sentinel are rejected.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Default capacity for the audio channel (chunks).
pub const DEFAULT_AUDIO_CAPACITY: usize = 50;

/// Default capacity for the video channel (frames).
pub const DEFAULT_VIDEO_CAPACITY: usize = 5;

/// Result of admitting an item into a [`MediaChannel`].
#[derive(Debug, PartialEq, Eq)]
pub enum PushOutcome<T> {
    /// Item queued without evicting anything.
    Queued,
    /// Item queued after evicting the oldest queued item.
    Evicted(T),
    /// Channel already shut down; the item was discarded.
    Closed(T),
}

#[derive(Debug)]
struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Fixed-capacity single-consumer queue with drop-oldest admission.
#[derive(Debug)]
pub struct MediaChannel<T> {
    name: &'static str,
    capacity: usize,
    inner: Mutex<Inner<T>>,
    notify: Notify,
    pushed: AtomicU64,
    dropped: AtomicU64,
}

impl<T> MediaChannel<T> {
    /// Create a channel holding at most `capacity` items.
    ///
    /// A zero capacity is bumped to one so the channel can always hold the
    /// freshest item.
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            name,
            capacity,
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            notify: Notify::new(),
            pushed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Admit an item, evicting the oldest one if the channel is full.
    ///
    /// Never waits on the consumer; the lock is held only for the queue
    /// update.
    pub fn push(&self, item: T) -> PushOutcome<T> {
        let outcome = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return PushOutcome::Closed(item);
            }

            let evicted = if inner.items.len() >= self.capacity {
                inner.items.pop_front()
            } else {
                None
            };
            inner.items.push_back(item);

            match evicted {
                Some(old) => PushOutcome::Evicted(old),
                None => PushOutcome::Queued,
            }
        };

        self.pushed.fetch_add(1, Ordering::Relaxed);
        if matches!(outcome, PushOutcome::Evicted(_)) {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!(
                channel = self.name,
                dropped,
                "Media channel full, evicted oldest chunk"
            );
        }

        self.notify.notify_one();
        outcome
    }

    /// Wait for the next item.
    ///
    /// Returns `None` once the channel has been closed and every item
    /// queued before the close has been handed out.
    pub async fn pop(&self) -> Option<T> {
        loop {
            {
                let mut inner = self.inner.lock();
                if let Some(item) = inner.items.pop_front() {
                    return Some(item);
                }
                if inner.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Take the next item without waiting.
    pub fn try_pop(&self) -> Option<T> {
        self.inner.lock().items.pop_front()
    }

    /// Push the shutdown sentinel.
    ///
    /// Idempotent. Wakes the draining worker so it can observe the sentinel.
    pub fn close(&self) {
        let newly_closed = {
            let mut inner = self.inner.lock();
            !std::mem::replace(&mut inner.closed, true)
        };
        if newly_closed {
            tracing::debug!(channel = self.name, "Media channel closed");
        }
        self.notify.notify_one();
    }

    /// Whether the sentinel has been pushed.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Whether no items are queued.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Maximum number of queued items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Channel name used in logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Admission statistics.
    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            pushed: self.pushed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            queued: self.len(),
            capacity: self.capacity,
        }
    }
}

/// Channel statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStats {
    pub pushed: u64,
    pub dropped: u64,
    pub queued: usize,
    pub capacity: usize,
}
