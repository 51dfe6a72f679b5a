//! Live WebSocket handler
//!
//! `GET /ws` upgrades to a live audio/video session with the conversational
//! engine. See [`crate::core::session::messages`] for the wire protocol.

mod handler;

pub use handler::{LiveQuery, MAX_RESUME_HANDLE_SIZE, live_handler};
