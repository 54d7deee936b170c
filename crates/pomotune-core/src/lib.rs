//! # Pomotune Core Library
//!
//! Core logic for Pomotune, a pomodoro timer that switches Spotify playlists
//! as sessions change. All operations are available through the standalone
//! CLI binary; any other front end is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Timer Engine**: a tick-driven state machine cycling Work, ShortBreak
//!   and LongBreak. The caller owns time and feeds ticks in.
//! - **Storage**: SQLite key-value store for settings and tokens, TOML for
//!   application configuration
//! - **Integrations**: PKCE authorization and the Spotify Web API client,
//!   plus the playback sync that follows engine events
//!
//! ## Key Components
//!
//! - [`IntervalEngine`]: session state machine
//! - [`SpotifyClient`]: authenticated Spotify requests with single-flight
//!   token refresh
//! - [`PlaybackSync`]: plays the playlist bound to each session kind
//! - [`Database`]: durable key-value persistence
//! - [`Config`]: application configuration management

pub mod clock;
pub mod error;
pub mod events;
pub mod integrations;
pub mod storage;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AuthError, ConfigError, SpotifyError, StorageError};
pub use events::{Event, TransitionReason};
pub use integrations::{CallbackParams, PlaybackSync, PlaylistBindings, SpotifyClient};
pub use storage::{Config, Database, KvStore, MemoryStore};
pub use timer::{Durations, EngineSnapshot, IntervalEngine, Session, SessionKind, TickSource};
