//! Shared application state.
//!
//! Holds the configuration, the live engine, the scene story generator and
//! the active-connection registry. Each session reserves a
//! [`ConnectionPermit`] before the WebSocket upgrade and turns it into a
//! [`ConnectionGuard`] once the socket is live; dropping either releases the
//! slot, so cleanup happens on every exit path.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::core::realtime::{GeminiLive, SharedRealtime};
use crate::core::tools::{GeminiStoryGenerator, SceneStoryGenerator};

/// Reasons a new connection is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionLimitError {
    GlobalLimitReached,
}

impl std::fmt::Display for ConnectionLimitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionLimitError::GlobalLimitReached => write!(f, "global connection limit reached"),
        }
    }
}

impl std::error::Error for ConnectionLimitError {}

/// A live connection.
#[derive(Debug, Clone)]
pub struct ConnectionEntry {
    pub session_id: String,
    pub connected_at: Instant,
}

#[derive(Debug, Default)]
struct RegistryInner {
    active: DashMap<String, ConnectionEntry>,
    reserved: AtomicUsize,
    max: Option<usize>,
}

/// Active-connection registry with an optional global cap.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

impl ConnectionRegistry {
    pub fn new(max: Option<usize>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                max,
                ..Default::default()
            }),
        }
    }

    /// Reserve a slot for a new connection.
    pub fn try_acquire(&self) -> Result<ConnectionPermit, ConnectionLimitError> {
        let reserved = &self.inner.reserved;
        let mut current = reserved.load(Ordering::Acquire);
        loop {
            if let Some(max) = self.inner.max
                && current >= max
            {
                return Err(ConnectionLimitError::GlobalLimitReached);
            }
            match reserved.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        Ok(ConnectionPermit {
            inner: Arc::new(PermitInner {
                registry: self.inner.clone(),
            }),
        })
    }

    /// Slots currently reserved, including connections still upgrading.
    pub fn reserved(&self) -> usize {
        self.inner.reserved.load(Ordering::Acquire)
    }

    /// Number of established connections.
    pub fn active(&self) -> usize {
        self.inner.active.len()
    }

    pub fn get(&self, conn_id: &str) -> Option<ConnectionEntry> {
        self.inner.active.get(conn_id).map(|entry| entry.clone())
    }
}

#[derive(Debug)]
struct PermitInner {
    registry: Arc<RegistryInner>,
}

impl Drop for PermitInner {
    fn drop(&mut self) {
        self.registry.reserved.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A reserved connection slot, released on drop.
///
/// Cloneable so it can travel as a request extension.
#[derive(Debug, Clone)]
pub struct ConnectionPermit {
    inner: Arc<PermitInner>,
}

impl ConnectionPermit {
    /// Record the connection as active for as long as the guard lives.
    pub fn register(self, conn_id: impl Into<String>, session_id: impl Into<String>) -> ConnectionGuard {
        let conn_id = conn_id.into();
        self.inner.registry.active.insert(
            conn_id.clone(),
            ConnectionEntry {
                session_id: session_id.into(),
                connected_at: Instant::now(),
            },
        );
        ConnectionGuard {
            conn_id,
            permit: self,
        }
    }
}

/// An established connection; removes its registry entry on drop.
#[derive(Debug)]
pub struct ConnectionGuard {
    conn_id: String,
    permit: ConnectionPermit,
}

impl ConnectionGuard {
    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if let Some((_, entry)) = self.permit.inner.registry.active.remove(&self.conn_id) {
            info!(
                conn_id = %self.conn_id,
                duration_secs = entry.connected_at.elapsed().as_secs(),
                "Connection removed from registry"
            );
        }
    }
}

/// Application state shared by all handlers.
pub struct AppState {
    pub config: ServerConfig,
    pub engine: SharedRealtime,
    pub story_generator: Option<Arc<dyn SceneStoryGenerator>>,
    pub connections: ConnectionRegistry,
}

impl AppState {
    /// Build state with the Gemini engine and story generator.
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let story_generator: Option<Arc<dyn SceneStoryGenerator>> = match config.gemini_api_key() {
            Some(key) => match GeminiStoryGenerator::new(key, &config.story) {
                Ok(generator) => Some(Arc::new(generator)),
                Err(e) => {
                    warn!("Scene story generator unavailable: {}", e);
                    None
                }
            },
            None => {
                warn!("GEMINI_API_KEY not set; describe_place will not be offered");
                None
            }
        };
        Self::with_components(config, Arc::new(GeminiLive::new()), story_generator)
    }

    /// Build state around explicit collaborators.
    pub fn with_components(
        config: ServerConfig,
        engine: SharedRealtime,
        story_generator: Option<Arc<dyn SceneStoryGenerator>>,
    ) -> Arc<Self> {
        let connections = ConnectionRegistry::new(config.max_websocket_connections);
        Arc::new(Self {
            config,
            engine,
            story_generator,
            connections,
        })
    }

    /// Number of live WebSocket sessions.
    pub fn ws_connection_count(&self) -> usize {
        self.connections.active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permits_respect_limit() {
        let registry = ConnectionRegistry::new(Some(2));
        let first = registry.try_acquire().unwrap();
        let _second = registry.try_acquire().unwrap();
        assert_eq!(
            registry.try_acquire().unwrap_err(),
            ConnectionLimitError::GlobalLimitReached
        );

        drop(first);
        assert_eq!(registry.reserved(), 1);
        assert!(registry.try_acquire().is_ok());
    }

    #[test]
    fn test_cloned_permit_released_once() {
        let registry = ConnectionRegistry::new(Some(1));
        let permit = registry.try_acquire().unwrap();
        let clone = permit.clone();
        drop(permit);
        assert_eq!(registry.reserved(), 1);
        drop(clone);
        assert_eq!(registry.reserved(), 0);
    }

    #[test]
    fn test_guard_registers_and_cleans_up() {
        let registry = ConnectionRegistry::new(None);
        let guard = registry
            .try_acquire()
            .unwrap()
            .register("c1", "session_c1");
        assert_eq!(registry.active(), 1);
        assert_eq!(registry.get("c1").unwrap().session_id, "session_c1");
        assert_eq!(guard.conn_id(), "c1");

        drop(guard);
        assert_eq!(registry.active(), 0);
        assert_eq!(registry.reserved(), 0);
        assert!(registry.get("c1").is_none());
    }

    #[test]
    fn test_unlimited_registry() {
        let registry = ConnectionRegistry::new(None);
        let permits: Vec<_> = (0..100).map(|_| registry.try_acquire().unwrap()).collect();
        assert_eq!(registry.reserved(), 100);
        drop(permits);
        assert_eq!(registry.reserved(), 0);
    }

    #[test]
    fn test_state_without_api_key_has_no_generator() {
        let state = AppState::new(ServerConfig::default());
        assert!(state.story_generator.is_none());
        assert_eq!(state.ws_connection_count(), 0);
    }
}
