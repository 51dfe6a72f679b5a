//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `live` - Live audio/video session WebSocket

pub mod api;
pub mod live;

// Re-export commonly used handlers for convenient access
pub use live::live_handler;
