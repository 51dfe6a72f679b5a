//! Live WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::live::live_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the live session router
///
/// # Endpoint
///
/// `GET /ws` - WebSocket upgrade for a live audio/video session.
/// Optional query `session_id` resumes an earlier engine session.
///
/// # Protocol
///
/// Clients send JSON objects with a `type` of `audio`, `video`, `text`,
/// `speak_text` or `end`; media travels base64-encoded in `data`.
///
/// Server responds with:
/// - `ready` once the socket is accepted
/// - `audio` / `text` as the assistant speaks
/// - `interrupted` and `turn_complete` at turn boundaries
/// - `session_id` when a resumable handle is issued
/// - `error` with a stable code before the session closes
///
/// # Example
///
/// ```json
/// // Client sends a camera frame, then asks about it
/// {"type": "video", "data": "/9j/4AAQ...", "mode": "webcam"}
/// {"type": "text", "data": "Describe this place"}
///
/// // Server streams the answer
/// {"type": "audio", "data": "AAEC..."}
/// {"type": "turn_complete", "session_id": "handle-1"}
/// ```
pub fn create_live_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws", get(live_handler))
        .layer(TraceLayer::new_for_http())
}
