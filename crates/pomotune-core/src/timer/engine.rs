//! Interval engine implementation.
//!
//! The engine is a logical-tick state machine. It owns no thread and reads no
//! clock: the caller feeds it ticks (see [`super::TickSource`]) once per
//! wall-clock second while it is running.
//!
//! ## Cycle
//!
//! ```text
//! Work -> ShortBreak -> Work -> ... -> Work -> LongBreak (every Nth) -> Work
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = IntervalEngine::new(Durations::default());
//! engine.start();
//! // Once per second:
//! if let Some(event) = engine.tick() { /* session changed */ }
//! ```

use serde::{Deserialize, Serialize};

use super::session::{Durations, Session, SessionKind};
use crate::error::ConfigError;
use crate::events::{Event, TransitionReason};

pub const DEFAULT_LONG_BREAK_EVERY: u32 = 4;

/// Read-only view handed to the shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub kind: SessionKind,
    pub label: String,
    pub running: bool,
    pub remaining_secs: u64,
    pub duration_secs: u64,
    pub progress_pct: f64,
    pub completed_work_sessions: u32,
    pub long_break_every: u32,
}

/// Core interval engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalEngine {
    durations: Durations,
    session: Session,
    running: bool,
    completed_work_sessions: u32,
    long_break_every: u32,
    /// Keep running into the next session instead of stopping at every
    /// boundary.
    #[serde(default)]
    auto_continue: bool,
}

impl IntervalEngine {
    /// Create an engine idle at the start of a Work session.
    pub fn new(durations: Durations) -> Self {
        Self {
            session: Session::fresh(SessionKind::Work, &durations),
            durations,
            running: false,
            completed_work_sessions: 0,
            long_break_every: DEFAULT_LONG_BREAK_EVERY,
            auto_continue: false,
        }
    }

    /// Every `every`th completed Work session routes to a long break.
    pub fn with_long_break_every(mut self, every: u32) -> Result<Self, ConfigError> {
        if every == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timer.long_break_every".into(),
                message: "must be at least 1".into(),
            });
        }
        self.long_break_every = every;
        Ok(self)
    }

    pub fn with_auto_continue(mut self, auto_continue: bool) -> Self {
        self.auto_continue = auto_continue;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn kind(&self) -> SessionKind {
        self.session.kind
    }

    pub fn remaining_secs(&self) -> u64 {
        self.session.remaining_secs
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn completed_work_sessions(&self) -> u32 {
        self.completed_work_sessions
    }

    pub fn durations(&self) -> &Durations {
        &self.durations
    }

    pub fn long_break_every(&self) -> u32 {
        self.long_break_every
    }

    pub fn auto_continue(&self) -> bool {
        self.auto_continue
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            kind: self.session.kind,
            label: self.session.kind.label().to_string(),
            running: self.running,
            remaining_secs: self.session.remaining_secs,
            duration_secs: self.session.duration_secs,
            progress_pct: (self.session.progress() * 100.0).min(100.0),
            completed_work_sessions: self.completed_work_sessions,
            long_break_every: self.long_break_every,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        if self.running {
            return None;
        }
        self.running = true;
        Some(Event::SessionStarted {
            kind: self.session.kind,
            remaining_secs: self.session.remaining_secs,
        })
    }

    pub fn pause(&mut self) -> Option<Event> {
        if !self.running {
            return None;
        }
        self.running = false;
        Some(Event::SessionPaused {
            kind: self.session.kind,
            remaining_secs: self.session.remaining_secs,
        })
    }

    /// Stop and rewind the current session. Kind and counters are kept.
    pub fn reset(&mut self) -> Option<Event> {
        self.running = false;
        self.session = Session::fresh(self.session.kind, &self.durations);
        Some(Event::SessionReset {
            kind: self.session.kind,
            remaining_secs: self.session.remaining_secs,
        })
    }

    /// Finish the current session now, running or not.
    pub fn skip(&mut self) -> Option<Event> {
        self.session.remaining_secs = 0;
        Some(self.complete(TransitionReason::Skipped))
    }

    /// One second elapsed. Returns `Some(Event::SessionChanged)` when the
    /// session completes.
    pub fn tick(&mut self) -> Option<Event> {
        self.advance(1)
    }

    /// `secs` seconds elapsed since the last call.
    ///
    /// A backlog larger than the remaining time (e.g. after the host slept)
    /// completes the current session once; the surplus is discarded rather
    /// than carried into the next session.
    pub fn advance(&mut self, secs: u64) -> Option<Event> {
        if !self.running || secs == 0 {
            return None;
        }
        self.session.remaining_secs = self.session.remaining_secs.saturating_sub(secs);
        if self.session.remaining_secs == 0 {
            return Some(self.complete(TransitionReason::Completed));
        }
        None
    }

    /// Replace the configured durations.
    ///
    /// A stopped engine picks up the new length of its current kind right
    /// away; a running one keeps its countdown and the change applies the
    /// next time that kind is entered.
    pub fn set_durations(&mut self, durations: Durations) -> Result<(), ConfigError> {
        durations.validate()?;
        let kind = self.session.kind;
        let changed = durations.minutes_for(kind) != self.durations.minutes_for(kind);
        self.durations = durations;
        if changed && !self.running {
            self.session = Session::fresh(kind, &self.durations);
        }
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn next_kind(&self) -> SessionKind {
        match self.session.kind {
            SessionKind::Work => {
                if self.completed_work_sessions % self.long_break_every == 0 {
                    SessionKind::LongBreak
                } else {
                    SessionKind::ShortBreak
                }
            }
            SessionKind::ShortBreak | SessionKind::LongBreak => SessionKind::Work,
        }
    }

    fn complete(&mut self, reason: TransitionReason) -> Event {
        let from = self.session.kind;
        if from == SessionKind::Work {
            self.completed_work_sessions = self.completed_work_sessions.saturating_add(1);
        }
        let to = self.next_kind();
        self.session = Session::fresh(to, &self.durations);
        self.running = self.running && self.auto_continue;
        tracing::debug!(%from, %to, ?reason, completed = self.completed_work_sessions, "session changed");
        Event::SessionChanged {
            from,
            to,
            completed_work_sessions: self.completed_work_sessions,
            reason,
            running: self.running,
        }
    }
}

impl Default for IntervalEngine {
    fn default() -> Self {
        Self::new(Durations::default())
    }
}
