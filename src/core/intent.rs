//! Intent gate for the describe-scene tool.
//!
//! The gate is a per-turn permission: it opens when the user's transcribed
//! speech or typed text explicitly asks for a scene description, and it is
//! reset at every turn boundary. The tool only reads it.

use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::Lazy;
use regex::Regex;

/// Name under which the describe-scene tool is exposed to the engine.
pub const DESCRIBE_PLACE_TOOL: &str = "describe_place";

/// Ordered intent grammar. Case-insensitive, first match wins.
static INTENT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\brun\s+describe_place\b",
        r"(?i)\bdescribe\s+(this|the)?\s*(place|building|landmark)\b",
        r"(?i)\bwhat\s+is\s+this\s+(place|building|landmark)\b",
        // ru-RU
        r"(?i)\bзапусти\s+describe_place\b",
        r"(?i)\bопиши\s+(это|здание|место|достопримечательность)\b",
        // de-DE
        r"(?i)\bbeschreibe?\s+(diesen|dieses|das|den)?\s*(ort|gebäude|wahrzeichen)\b",
        r"(?i)\bwas\s+ist\s+(das|dieses|dieser)\s+(für\s+ein\s+)?(ort|gebäude|wahrzeichen)\b",
    ]
    .iter()
    .filter_map(|pattern| match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::error!("Invalid intent pattern {}: {}", pattern, e);
            None
        }
    })
    .collect()
});

/// Whether `text` explicitly requests a scene description.
pub fn matches_describe_intent(text: &str) -> bool {
    INTENT_PATTERNS.iter().any(|re| re.is_match(text))
}

/// Per-turn permission flag for the describe-scene tool.
#[derive(Debug, Default)]
pub struct IntentGate {
    open: AtomicBool,
}

impl IntentGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate `text` against the intent grammar and store the result.
    pub fn set_from_text(&self, text: &str) -> bool {
        let allowed = matches_describe_intent(text);
        self.open.store(allowed, Ordering::SeqCst);
        if allowed {
            tracing::debug!("Describe intent detected in user text");
        }
        allowed
    }

    /// Open the gate if `text` asks for a description; never closes it.
    pub fn open_if_requested(&self, text: &str) -> bool {
        let allowed = matches_describe_intent(text);
        if allowed {
            self.open.store(true, Ordering::SeqCst);
        }
        allowed
    }

    /// Close the gate unconditionally.
    pub fn reset(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
