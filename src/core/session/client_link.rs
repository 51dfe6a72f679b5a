//! Outbound path to the WebSocket client.
//!
//! Workers never touch the socket directly. They hand messages to a
//! [`ClientLink`], and a single sender task owns the socket sink. The link
//! carries the session's "client still reachable" flag: once the client is
//! gone, sends are skipped instead of retried.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::ws::Message;
use futures::{Sink, SinkExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::messages::{LiveMessageRoute, LiveOutgoingMessage};

/// Outgoing route buffer per connection
pub const CLIENT_CHANNEL_CAPACITY: usize = 1024;

/// Cloneable handle for sending messages to the client.
#[derive(Debug, Clone)]
pub struct ClientLink {
    tx: mpsc::Sender<LiveMessageRoute>,
    alive: Arc<AtomicBool>,
}

impl ClientLink {
    /// Create a link and the receiving end consumed by [`run_sender`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<LiveMessageRoute>) {
        let (tx, rx) = mpsc::channel(capacity);
        let link = Self {
            tx,
            alive: Arc::new(AtomicBool::new(true)),
        };
        (link, rx)
    }

    /// Queue a message for the client.
    ///
    /// Returns `false` without sending once the client is gone.
    pub async fn send(&self, message: LiveOutgoingMessage) -> bool {
        if !self.is_alive() {
            debug!("Client disconnected, skipping outgoing message");
            return false;
        }
        if self
            .tx
            .send(LiveMessageRoute::Outgoing(message))
            .await
            .is_err()
        {
            self.mark_disconnected();
            return false;
        }
        true
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn mark_disconnected(&self) {
        self.alive.store(false, Ordering::Release);
    }

    /// Ask the sender task to close the socket.
    pub async fn close(&self) {
        if self.is_alive() {
            let _ = self.tx.send(LiveMessageRoute::Close).await;
        }
    }
}

/// Drain routed messages into the socket sink until closed.
///
/// Marks the link disconnected when the sink fails.
pub async fn run_sender<S>(mut sink: S, mut rx: mpsc::Receiver<LiveMessageRoute>, link: ClientLink)
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    while let Some(route) = rx.recv().await {
        let should_close = matches!(route, LiveMessageRoute::Close);

        let result = match route {
            LiveMessageRoute::Outgoing(message) => match serde_json::to_string(&message) {
                Ok(json_str) => sink.send(Message::Text(json_str.into())).await,
                Err(e) => {
                    error!("Failed to serialize outgoing message: {}", e);
                    continue;
                }
            },
            LiveMessageRoute::Close => {
                info!("Closing live WebSocket connection");
                sink.send(Message::Close(None)).await
            }
        };

        if let Err(e) = result {
            debug!("Failed to send WebSocket message: {}", e);
            link.mark_disconnected();
            break;
        }

        if should_close {
            break;
        }
    }
}
