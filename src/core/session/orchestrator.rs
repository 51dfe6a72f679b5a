//! Session orchestrator
//!
//! One [`Session`] per client connection. It owns the media channels, the
//! frame slot and the intent gate, runs the four workers as one cancellation
//! scope and tears everything down when the first of them exits.
//!
//! # Shutdown
//!
//! 1. Cancel the scope (unblocks ingress and the response worker)
//! 2. Close both media channels (sentinel for the media workers)
//! 3. Ask the engine to finish
//! 4. Report a session-fatal error to the client if it is still reachable
//! 5. Give the siblings a short grace period, then abort whatever is left

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use bytes::Bytes;
use futures::{FutureExt, Stream};
use tokio::task::{self, AbortHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::client_link::ClientLink;
use super::ingress::Ingress;
use super::media::{run_audio_worker, run_video_worker};
use super::messages::LiveOutgoingMessage;
use super::response::run_response_worker;
use super::turn::TurnTracker;
use crate::config::MediaConfig;
use crate::core::intent::IntentGate;
use crate::core::media::{FrameSlot, MediaChannel, VideoChunk};
use crate::core::realtime::RealtimeConnection;
use crate::core::realtime::gemini::audio_mime_type;
use crate::errors::session_error::{ErrorCode, SessionError, SessionResult};

/// Application name reported for every session.
pub const APP_NAME: &str = "multimodal_assistant";

/// How long siblings get to finish after the first worker exits.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Identifiers attached to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIds {
    pub app: String,
    pub user: String,
    pub session: String,
}

impl SessionIds {
    pub fn for_connection(conn_id: &str) -> Self {
        Self {
            app: APP_NAME.to_string(),
            user: format!("user_{conn_id}"),
            session: format!("session_{conn_id}"),
        }
    }
}

/// The four workers of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Worker {
    Ingress,
    Audio,
    Video,
    Response,
}

impl Worker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Worker::Ingress => "ingress",
            Worker::Audio => "audio",
            Worker::Video => "video",
            Worker::Response => "response",
        }
    }
}

impl std::fmt::Display for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a session ended: which worker exited first, and why.
#[derive(Debug)]
pub enum SessionOutcome {
    Completed { worker: Worker },
    Failed { worker: Worker, error: SessionError },
}

impl SessionOutcome {
    pub fn worker(&self) -> Worker {
        match self {
            SessionOutcome::Completed { worker } | SessionOutcome::Failed { worker, .. } => *worker,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, SessionOutcome::Failed { .. })
    }

    /// Code reported to the client, for failed sessions.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            SessionOutcome::Completed { .. } => None,
            SessionOutcome::Failed { error, .. } => Some(error.client_code()),
        }
    }
}

type WorkerExit = (Worker, SessionResult<()>);

/// Worker tasks, remembered by task id so an aborted task is still named.
struct WorkerSet {
    tasks: JoinSet<WorkerExit>,
    names: HashMap<task::Id, Worker>,
}

impl WorkerSet {
    fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
            names: HashMap::new(),
        }
    }

    /// Spawn `task` with its panics turned into `WorkerPanicked`.
    fn spawn<F>(&mut self, worker: Worker, task: F) -> AbortHandle
    where
        F: Future<Output = SessionResult<()>> + Send + 'static,
    {
        let handle = self.tasks.spawn(async move {
            let result = match AssertUnwindSafe(task).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Err(SessionError::WorkerPanicked {
                    worker: worker.as_str(),
                    message: panic_message(panic.as_ref()),
                }),
            };
            (worker, result)
        });
        self.names.insert(handle.id(), worker);
        handle
    }

    async fn join_next(&mut self) -> Option<WorkerExit> {
        let exit = match self.tasks.join_next_with_id().await? {
            Ok((id, exit)) => {
                self.names.remove(&id);
                exit
            }
            // Workers catch their own panics; a join error means the task was aborted.
            Err(e) => {
                let worker = self.names.remove(&e.id()).unwrap_or(Worker::Response);
                let error = SessionError::WorkerPanicked {
                    worker: worker.as_str(),
                    message: e.to_string(),
                };
                (worker, Err(error))
            }
        };
        Some(exit)
    }

    async fn shutdown(&mut self) {
        self.tasks.shutdown().await;
        self.names.clear();
    }
}

/// Per-connection session state.
pub struct Session {
    ids: SessionIds,
    gate: Arc<IntentGate>,
    slot: Arc<FrameSlot>,
    audio: Arc<MediaChannel<Bytes>>,
    video: Arc<MediaChannel<VideoChunk>>,
    cancel: CancellationToken,
    audio_mime_type: String,
    resume_handle: Option<String>,
}

impl Session {
    pub fn new(
        ids: SessionIds,
        media: &MediaConfig,
        send_sample_rate: u32,
        resume_handle: Option<String>,
    ) -> Self {
        Self {
            ids,
            gate: Arc::new(IntentGate::new()),
            slot: Arc::new(FrameSlot::new()),
            audio: Arc::new(MediaChannel::new("audio", media.audio_queue_capacity)),
            video: Arc::new(MediaChannel::new("video", media.video_queue_capacity)),
            cancel: CancellationToken::new(),
            audio_mime_type: audio_mime_type(send_sample_rate),
            resume_handle,
        }
    }

    pub fn ids(&self) -> &SessionIds {
        &self.ids
    }

    /// Gate shared with the describe-scene tool.
    pub fn gate(&self) -> Arc<IntentGate> {
        self.gate.clone()
    }

    /// Frame slot shared with the describe-scene tool.
    pub fn frame_slot(&self) -> Arc<FrameSlot> {
        self.slot.clone()
    }

    /// Run the session until the first worker exits, then shut down the rest.
    pub async fn run<S>(
        self,
        incoming: S,
        link: ClientLink,
        connection: RealtimeConnection,
    ) -> SessionOutcome
    where
        S: Stream<Item = Result<Message, axum::Error>> + Unpin + Send + 'static,
    {
        let RealtimeConnection { requests, events } = connection;
        let session_id = self.ids.session.clone();
        info!(session_id = %session_id, user_id = %self.ids.user, "Session started");

        let mut workers = WorkerSet::new();

        let ingress = Ingress::new(
            self.audio.clone(),
            self.video.clone(),
            requests.clone(),
            self.gate.clone(),
        );
        workers.spawn(
            Worker::Ingress,
            ingress.run(incoming, link.clone(), self.cancel.clone()),
        );
        workers.spawn(
            Worker::Audio,
            run_audio_worker(
                self.audio.clone(),
                requests.clone(),
                self.audio_mime_type.clone(),
            ),
        );
        workers.spawn(
            Worker::Video,
            run_video_worker(self.video.clone(), self.slot.clone(), requests.clone()),
        );
        let tracker = TurnTracker::new(self.gate.clone(), self.resume_handle.clone());
        workers.spawn(
            Worker::Response,
            run_response_worker(events, tracker, link.clone(), self.cancel.clone()),
        );

        let outcome = match workers.join_next().await {
            Some((worker, Ok(()))) => SessionOutcome::Completed { worker },
            Some((worker, Err(error))) => SessionOutcome::Failed { worker, error },
            None => SessionOutcome::Completed {
                worker: Worker::Ingress,
            },
        };

        self.cancel.cancel();
        self.audio.close();
        self.video.close();
        requests.close();

        match &outcome {
            SessionOutcome::Completed { worker } => {
                info!(session_id = %session_id, worker = %worker, "Session ending");
            }
            SessionOutcome::Failed { worker, error } => {
                error!(session_id = %session_id, worker = %worker, "Session failed: {}", error);
                if link.is_alive() {
                    link.send(LiveOutgoingMessage::Error {
                        data: error.client_code().as_str().to_string(),
                    })
                    .await;
                }
            }
        }

        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while let Some((worker, result)) = workers.join_next().await {
                match result {
                    Ok(()) => debug!(worker = %worker, "Worker stopped"),
                    Err(e) => debug!(worker = %worker, "Worker stopped: {}", e),
                }
            }
        })
        .await;
        if drained.is_err() {
            warn!(session_id = %session_id, "Workers still running after grace period, aborting");
            workers.shutdown().await;
        }

        link.close().await;
        info!(session_id = %session_id, "Session closed");
        outcome
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
