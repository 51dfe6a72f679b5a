//! Session-fatal errors and the stable codes reported to clients.

use thiserror::Error;

use crate::core::realtime::RealtimeError;

/// Stable error codes sent in `error` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The conversational engine closed or timed out.
    ModelConnectionClosed,
    /// Anything else that ended the session.
    ServerError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ModelConnectionClosed => "model_connection_closed",
            ErrorCode::ServerError => "server_error",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("engine error: {0}")]
    Engine(#[from] RealtimeError),

    #[error("{worker} worker panicked: {message}")]
    WorkerPanicked {
        worker: &'static str,
        message: String,
    },
}

impl SessionError {
    /// Code reported to the client for this error.
    pub fn client_code(&self) -> ErrorCode {
        match self {
            SessionError::Engine(e) if e.is_connection_loss() => ErrorCode::ModelConnectionClosed,
            _ => ErrorCode::ServerError,
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
