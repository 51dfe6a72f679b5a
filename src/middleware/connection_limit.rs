//! Connection limit middleware for live WebSocket sessions
//!
//! Reserves a slot in the active-connection registry before the upgrade and
//! hands it to the handler as a [`ConnectionPermit`] extension.
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use live_guide_gateway::middleware::connection_limit_middleware;
//!
//! let app = Router::new()
//!     .route("/ws", get(live_handler))
//!     .layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         connection_limit_middleware,
//!     ));
//! ```

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::errors::AppError;
use crate::state::AppState;

/// Middleware that enforces the global session limit.
///
/// Only WebSocket upgrade requests (detected by the Upgrade header) are
/// counted. Over-capacity upgrades get 503 Service Unavailable. The permit
/// is released when the request (and the session it starts) is dropped.
pub async fn connection_limit_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let is_ws_upgrade = request
        .headers()
        .get("upgrade")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);

    if !is_ws_upgrade {
        return next.run(request).await;
    }

    match state.connections.try_acquire() {
        Ok(permit) => {
            request.extensions_mut().insert(permit);
            next.run(request).await
        }
        Err(e) => {
            tracing::warn!(
                reserved = state.connections.reserved(),
                "Rejecting connection: {}",
                e
            );
            AppError::from(e).into_response()
        }
    }
}
