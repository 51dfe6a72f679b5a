//! Mock provider servers for integration tests
//!
//! - WebSocket: Gemini Live (`BidiGenerateContent`)

// Allow dead code in test infrastructure - not every test binary uses every helper
#![allow(dead_code)]

pub mod gemini_mock;
