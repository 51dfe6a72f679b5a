//! Turn lifecycle tracking.
//!
//! Turns move `Idle -> Active -> (Interrupted)? -> Idle`. The tracker folds
//! engine events into client messages, feeds user text to the intent gate,
//! and resets per-turn state when the engine reports completion.

use std::sync::Arc;

use base64::prelude::*;
use tracing::{debug, info, warn};

use super::messages::{INTERRUPTED_MESSAGE, LiveOutgoingMessage};
use crate::core::intent::IntentGate;
use crate::core::realtime::{LiveEvent, TranscriptRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnPhase {
    #[default]
    Idle,
    Active,
    Interrupted,
}

/// Ordered, duplicate-free list of transcript fragments.
#[derive(Debug, Default)]
struct Fragments(Vec<String>);

impl Fragments {
    fn push(&mut self, text: &str) {
        let text = text.trim();
        if !text.is_empty() && !self.0.iter().any(|t| t == text) {
            self.0.push(text.to_string());
        }
    }

    fn joined(&self) -> String {
        self.0.join(" ")
    }

    fn clear(&mut self) {
        self.0.clear();
    }
}

/// Per-session turn state machine.
#[derive(Debug)]
pub struct TurnTracker {
    phase: TurnPhase,
    input: Fragments,
    output: Fragments,
    /// User text seen this turn, matched as a whole against the intent grammar
    transcript: String,
    /// User text since the engine last produced output
    barge_in: String,
    resume_handle: Option<String>,
    gate: Arc<IntentGate>,
}

impl TurnTracker {
    pub fn new(gate: Arc<IntentGate>, resume_handle: Option<String>) -> Self {
        Self {
            phase: TurnPhase::Idle,
            input: Fragments::default(),
            output: Fragments::default(),
            transcript: String::new(),
            barge_in: String::new(),
            resume_handle,
            gate,
        }
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Latest resumable handle, if the engine issued one.
    pub fn resume_handle(&self) -> Option<&str> {
        self.resume_handle.as_deref()
    }

    /// Fold one engine event into the turn, returning what the client should see.
    pub fn handle(&mut self, event: LiveEvent) -> Vec<LiveOutgoingMessage> {
        match event {
            LiveEvent::Audio(data) => {
                self.activate();
                self.barge_in.clear();
                vec![LiveOutgoingMessage::Audio {
                    data: BASE64_STANDARD.encode(&data),
                }]
            }
            LiveEvent::Text {
                role: TranscriptRole::User,
                text,
                ..
            } => {
                self.activate();
                self.observe_user_text(&text);
                Vec::new()
            }
            LiveEvent::Text {
                role: TranscriptRole::Assistant,
                text,
                partial,
            } => {
                if !partial || text.is_empty() {
                    return Vec::new();
                }
                self.activate();
                self.barge_in.clear();
                self.output.push(&text);
                vec![LiveOutgoingMessage::Text { data: text }]
            }
            LiveEvent::Interrupted => {
                if self.phase == TurnPhase::Interrupted {
                    return Vec::new();
                }
                self.phase = TurnPhase::Interrupted;
                // Only the words that cut the response off carry over.
                self.transcript = std::mem::take(&mut self.barge_in);
                self.gate.set_from_text(&self.transcript);
                info!("Response interrupted by user input");
                vec![LiveOutgoingMessage::Interrupted {
                    data: INTERRUPTED_MESSAGE.to_string(),
                }]
            }
            LiveEvent::TurnComplete => self.complete(),
            LiveEvent::SessionResumption { handle, resumable } => match handle {
                Some(handle) if resumable && !handle.is_empty() => {
                    debug!("Session resumption handle updated");
                    self.resume_handle = Some(handle.clone());
                    vec![LiveOutgoingMessage::SessionId { data: handle }]
                }
                _ => Vec::new(),
            },
            LiveEvent::ToolCall { name } => {
                debug!(tool = %name, gate_open = self.gate.is_open(), "Engine invoked tool");
                Vec::new()
            }
            LiveEvent::GoAway { time_left } => {
                warn!(time_left = ?time_left, "Engine announced connection shutdown");
                Vec::new()
            }
        }
    }

    fn activate(&mut self) {
        if self.phase == TurnPhase::Idle {
            self.phase = TurnPhase::Active;
        }
    }

    fn observe_user_text(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        self.input.push(text);
        append_fragment(&mut self.transcript, text);
        append_fragment(&mut self.barge_in, text);
        self.gate.set_from_text(&self.transcript);
    }

    fn complete(&mut self) -> Vec<LiveOutgoingMessage> {
        let message = LiveOutgoingMessage::TurnComplete {
            session_id: self.resume_handle.clone(),
        };

        let input = self.input.joined();
        let output = self.output.joined();
        if !input.is_empty() {
            info!(input = %input, "Turn input");
        }
        if !output.is_empty() {
            info!(output = %output, "Turn output");
        }

        self.input.clear();
        self.output.clear();
        self.transcript.clear();
        self.barge_in.clear();
        self.phase = TurnPhase::Idle;
        self.gate.reset();

        vec![message]
    }
}

/// Transcription arrives in fragments that may split words across events.
fn append_fragment(buffer: &mut String, text: &str) {
    if !buffer.is_empty()
        && !buffer.ends_with(char::is_whitespace)
        && !text.starts_with(char::is_whitespace)
    {
        buffer.push(' ');
    }
    buffer.push_str(text);
}
