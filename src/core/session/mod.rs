//! Per-connection live session.
//!
//! - [`messages`]: client wire protocol
//! - [`ClientLink`]: outbound path and liveness flag
//! - [`TurnTracker`]: turn state machine over engine events
//! - [`Session`]: the orchestrator running ingress, audio, video and response workers

mod client_link;
mod ingress;
mod media;
pub mod messages;
mod orchestrator;
mod response;
mod turn;

pub use client_link::{CLIENT_CHANNEL_CAPACITY, ClientLink, run_sender};
pub use ingress::Ingress;
pub use media::{run_audio_worker, run_video_worker};
pub use messages::{
    INTERRUPTED_MESSAGE, LiveIncomingMessage, LiveMessageRoute, LiveOutgoingMessage,
    LiveValidationError, MAX_TEXT_SIZE, SPEAK_TEXT_PREFIX,
};
pub use orchestrator::{APP_NAME, Session, SessionIds, SessionOutcome, Worker};
pub use response::run_response_worker;
pub use turn::{TurnPhase, TurnTracker};
