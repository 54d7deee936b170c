use serde::{Deserialize, Serialize};

use crate::timer::SessionKind;

/// Why the engine moved to a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionReason {
    /// Countdown reached zero.
    Completed,
    /// User skipped the rest of the session.
    Skipped,
}

/// Every engine state change produces an Event.
/// The shell renders them; the playback sync reacts to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    SessionStarted {
        kind: SessionKind,
        remaining_secs: u64,
    },
    SessionPaused {
        kind: SessionKind,
        remaining_secs: u64,
    },
    SessionReset {
        kind: SessionKind,
        remaining_secs: u64,
    },
    /// Session boundary. Emitted exactly once per completion or skip.
    SessionChanged {
        from: SessionKind,
        to: SessionKind,
        completed_work_sessions: u32,
        reason: TransitionReason,
        /// Whether the engine kept running into the new session.
        running: bool,
    },
}

impl Event {
    /// Session kind the engine is in after this event.
    pub fn current_kind(&self) -> SessionKind {
        match self {
            Event::SessionStarted { kind, .. }
            | Event::SessionPaused { kind, .. }
            | Event::SessionReset { kind, .. } => *kind,
            Event::SessionChanged { to, .. } => *to,
        }
    }
}
