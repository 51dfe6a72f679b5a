//! Ingress demultiplexer.
//!
//! Reads client frames, classifies them by `type` and routes media into the
//! bounded channels and text straight to the engine. Typed text opens the
//! intent gate before it is forwarded. Malformed messages are logged and
//! dropped; the connection carries on.

use std::sync::Arc;

use axum::extract::ws::Message;
use base64::prelude::*;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::select;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client_link::ClientLink;
use super::messages::{LiveIncomingMessage, SPEAK_TEXT_PREFIX};
use crate::core::intent::IntentGate;
use crate::core::media::{MediaChannel, PushOutcome, VideoChunk};
use crate::core::realtime::LiveRequestQueue;
use crate::errors::session_error::SessionResult;

pub struct Ingress {
    audio: Arc<MediaChannel<Bytes>>,
    video: Arc<MediaChannel<VideoChunk>>,
    requests: LiveRequestQueue,
    gate: Arc<IntentGate>,
}

impl Ingress {
    pub fn new(
        audio: Arc<MediaChannel<Bytes>>,
        video: Arc<MediaChannel<VideoChunk>>,
        requests: LiveRequestQueue,
        gate: Arc<IntentGate>,
    ) -> Self {
        Self {
            audio,
            video,
            requests,
            gate,
        }
    }

    /// Read client frames until the client leaves or the session is cancelled.
    ///
    /// Returns `Ok` on disconnect; only a dead engine request queue is fatal.
    pub async fn run<S>(self, mut incoming: S, link: ClientLink, cancel: CancellationToken) -> SessionResult<()>
    where
        S: Stream<Item = Result<Message, axum::Error>> + Unpin,
    {
        loop {
            let frame = select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                frame = incoming.next() => frame,
            };

            match frame {
                Some(Ok(Message::Text(text))) => self.handle_text(text.as_str()).await?,
                Some(Ok(Message::Binary(data))) => {
                    debug!("Ignoring binary frame: {} bytes", data.len());
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => {
                    info!("Live WebSocket connection closed by client");
                    link.mark_disconnected();
                    return Ok(());
                }
                Some(Err(e)) => {
                    info!("Live WebSocket receive ended: {}", e);
                    link.mark_disconnected();
                    return Ok(());
                }
            }
        }
    }

    async fn handle_text(&self, text: &str) -> SessionResult<()> {
        let message: LiveIncomingMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping malformed client message: {}", e);
                return Ok(());
            }
        };

        if let Err(e) = message.validate_size() {
            warn!("Message validation failed: {}", e);
            return Ok(());
        }

        self.dispatch(message, Instant::now()).await
    }

    /// Route one parsed message. `received_at` timestamps video frames.
    pub async fn dispatch(
        &self,
        message: LiveIncomingMessage,
        received_at: Instant,
    ) -> SessionResult<()> {
        match message {
            LiveIncomingMessage::Audio { data } => {
                if let Some(bytes) = decode_media("audio", &data) {
                    log_push(self.audio.push(bytes), "audio");
                }
            }
            LiveIncomingMessage::Video { data, mode } => {
                if let Some(bytes) = decode_media("video", &data) {
                    let chunk = VideoChunk {
                        data: bytes,
                        mode,
                        received_at,
                    };
                    log_push(self.video.push(chunk), "video");
                }
            }
            LiveIncomingMessage::Text { data } => {
                if data.trim().is_empty() {
                    debug!("Dropping empty text message");
                } else {
                    // A tool call may race the engine's echo of this text.
                    self.gate.open_if_requested(&data);
                    self.requests.send_text(data).await?;
                }
            }
            LiveIncomingMessage::SpeakText { data } => {
                if data.trim().is_empty() {
                    debug!("Dropping empty speak_text message");
                } else {
                    self.requests
                        .send_speak_text(format!("{SPEAK_TEXT_PREFIX}{data}"))
                        .await?;
                }
            }
            LiveIncomingMessage::End => {
                info!("Client signalled end of input");
            }
        }
        Ok(())
    }
}

fn decode_media(kind: &str, data: &str) -> Option<Bytes> {
    match BASE64_STANDARD.decode(data) {
        Ok(bytes) if bytes.is_empty() => {
            debug!(kind, "Dropping empty media payload");
            None
        }
        Ok(bytes) => Some(Bytes::from(bytes)),
        Err(e) => {
            warn!(kind, "Dropping undecodable media payload: {}", e);
            None
        }
    }
}

fn log_push<T>(outcome: PushOutcome<T>, kind: &str) {
    match outcome {
        PushOutcome::Queued => {}
        PushOutcome::Evicted(_) => debug!(kind, "Channel full, dropped oldest chunk"),
        PushOutcome::Closed(_) => debug!(kind, "Channel closed, chunk discarded"),
    }
}
