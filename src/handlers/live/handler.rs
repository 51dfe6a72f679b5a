//! Connection lifecycle for live sessions.

use std::sync::Arc;

use axum::{
    Extension,
    extract::{
        Query, State,
        ws::{WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::StreamExt;
use serde::Deserialize;
use tokio::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::core::realtime::RealtimeConfig;
use crate::core::session::{
    CLIENT_CHANNEL_CAPACITY, ClientLink, LiveOutgoingMessage, Session, SessionIds, SessionOutcome,
    run_sender,
};
use crate::core::tools::{DescribeSceneTool, ToolRegistry};
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::state::{AppState, ConnectionPermit};

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Longest accepted `session_id` query value
pub const MAX_RESUME_HANDLE_SIZE: usize = 1024;

/// Time the sender task gets to flush the final messages
const SENDER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Query parameters of the live endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct LiveQuery {
    /// Resumable handle from an earlier session
    pub session_id: Option<String>,
}

impl LiveQuery {
    fn resume_handle(self) -> AppResult<Option<String>> {
        match self.session_id {
            Some(handle) if handle.len() > MAX_RESUME_HANDLE_SIZE => Err(AppError::BadRequest(
                format!("session_id exceeds {MAX_RESUME_HANDLE_SIZE} bytes"),
            )),
            Some(handle) if handle.trim().is_empty() => Ok(None),
            other => Ok(other),
        }
    }
}

/// Live WebSocket handler
///
/// Upgrades the HTTP connection to a live session. Uses the slot reserved by
/// the connection limit middleware, or reserves one itself when the route
/// is mounted without it.
pub async fn live_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<LiveQuery>,
    permit: Option<Extension<ConnectionPermit>>,
) -> AppResult<Response> {
    let resume_handle = query.resume_handle()?;
    let permit = match permit {
        Some(Extension(permit)) => permit,
        None => state.connections.try_acquire()?,
    };

    info!(
        resuming = resume_handle.is_some(),
        "Live WebSocket connection upgrade requested"
    );

    Ok(ws
        .max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_live_socket(socket, state, permit, resume_handle)))
}

async fn handle_live_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    permit: ConnectionPermit,
    resume_handle: Option<String>,
) {
    let conn_id = Uuid::new_v4().to_string();
    let ids = SessionIds::for_connection(&conn_id);
    // Dropped on every exit path, including panics.
    let _guard = permit.register(conn_id.clone(), ids.session.clone());
    info!(conn_id = %conn_id, "Live WebSocket connection established");

    let (sink, stream) = socket.split();
    let (link, rx) = ClientLink::channel(CLIENT_CHANNEL_CAPACITY);
    let mut sender_task = tokio::spawn(run_sender(sink, rx, link.clone()));

    link.send(LiveOutgoingMessage::Ready).await;

    let config = &state.config;
    let session = Session::new(
        ids,
        &config.media,
        config.live.send_sample_rate,
        resume_handle.clone(),
    );
    let tools = build_tools(&state, &session);
    let engine_config = RealtimeConfig::from_live(
        &config.live,
        config.gemini_api_key().unwrap_or_default().to_string(),
        resume_handle,
    );

    match state.engine.connect(engine_config, tools).await {
        Ok(connection) => {
            let outcome = session.run(stream, link.clone(), connection).await;
            match outcome {
                SessionOutcome::Completed { worker } => {
                    info!(conn_id = %conn_id, worker = %worker, "Live session finished");
                }
                SessionOutcome::Failed { worker, error } => {
                    error!(
                        conn_id = %conn_id,
                        worker = %worker,
                        code = %error.client_code(),
                        "Live session failed: {:?}",
                        error
                    );
                }
            }
        }
        Err(e) => {
            error!(conn_id = %conn_id, "Failed to connect to live engine: {}", e);
            link.send(LiveOutgoingMessage::Error {
                data: ErrorCode::ModelConnectionClosed.as_str().to_string(),
            })
            .await;
            link.close().await;
        }
    }

    drop(link);
    if tokio::time::timeout(SENDER_DRAIN_TIMEOUT, &mut sender_task)
        .await
        .is_err()
    {
        debug!(conn_id = %conn_id, "Sender task did not finish, aborting");
        sender_task.abort();
    }

    info!(conn_id = %conn_id, "Live WebSocket connection terminated");
}

/// Tools offered to the engine for one session.
fn build_tools(state: &AppState, session: &Session) -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    if let Some(generator) = &state.story_generator {
        tools.register(Arc::new(DescribeSceneTool::new(
            session.gate(),
            session.frame_slot(),
            generator.clone(),
            state.config.profile.clone(),
            state.config.media.frame_freshness(),
        )));
    }
    tools
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_handle_validation() {
        let query = LiveQuery { session_id: None };
        assert_eq!(query.resume_handle().unwrap(), None);

        let query = LiveQuery {
            session_id: Some("  ".to_string()),
        };
        assert_eq!(query.resume_handle().unwrap(), None);

        let query = LiveQuery {
            session_id: Some("handle-1".to_string()),
        };
        assert_eq!(query.resume_handle().unwrap().as_deref(), Some("handle-1"));

        let query = LiveQuery {
            session_id: Some("x".repeat(MAX_RESUME_HANDLE_SIZE + 1)),
        };
        assert!(matches!(
            query.resume_handle(),
            Err(AppError::BadRequest(_))
        ));
    }
}
