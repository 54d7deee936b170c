//! User settings persisted in the key-value store: session durations and
//! playlist bindings.
//!
//! Values are stored as plain strings so the store stays readable. A missing
//! or unparsable entry falls back to the default for that field.

use crate::error::StorageError;
use crate::integrations::spotify::{extract_playlist_id, playlist_url, PlaylistBindings};
use crate::timer::{Durations, SessionKind};

use super::kv::KvStore;

pub const WORK_MINUTES_KEY: &str = "timer.work_minutes";
pub const SHORT_BREAK_MINUTES_KEY: &str = "timer.short_break_minutes";
pub const LONG_BREAK_MINUTES_KEY: &str = "timer.long_break_minutes";

fn minutes_key(kind: SessionKind) -> &'static str {
    match kind {
        SessionKind::Work => WORK_MINUTES_KEY,
        SessionKind::ShortBreak => SHORT_BREAK_MINUTES_KEY,
        SessionKind::LongBreak => LONG_BREAK_MINUTES_KEY,
    }
}

fn binding_key(kind: SessionKind) -> &'static str {
    match kind {
        SessionKind::Work => "playlist.work",
        SessionKind::ShortBreak => "playlist.short_break",
        SessionKind::LongBreak => "playlist.long_break",
    }
}

pub fn load_durations(store: &dyn KvStore) -> Durations {
    let defaults = Durations::default();
    let read = |kind: SessionKind| -> u32 {
        let fallback = defaults.minutes_for(kind);
        match store.get(minutes_key(kind)) {
            Ok(Some(raw)) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(key = minutes_key(kind), value = %raw, "ignoring unparsable duration");
                fallback
            }),
            Ok(None) => fallback,
            Err(e) => {
                tracing::warn!(key = minutes_key(kind), error = %e, "failed to read duration");
                fallback
            }
        }
    };
    let loaded = Durations {
        work_min: read(SessionKind::Work),
        short_break_min: read(SessionKind::ShortBreak),
        long_break_min: read(SessionKind::LongBreak),
    };
    match loaded.validate() {
        Ok(()) => loaded,
        Err(e) => {
            tracing::warn!(error = %e, "stored durations invalid, using defaults");
            defaults
        }
    }
}

pub fn save_durations(store: &dyn KvStore, durations: &Durations) -> Result<(), StorageError> {
    for kind in SessionKind::ALL {
        store.set(minutes_key(kind), &durations.minutes_for(kind).to_string())?;
    }
    Ok(())
}

/// Bindings are stored as shareable playlist URLs.
pub fn load_bindings(store: &dyn KvStore) -> PlaylistBindings {
    let mut bindings = PlaylistBindings::default();
    for kind in SessionKind::ALL {
        match store.get(binding_key(kind)) {
            Ok(Some(url)) => bindings.set(kind, extract_playlist_id(&url)),
            Ok(None) => {}
            Err(e) => tracing::warn!(key = binding_key(kind), error = %e, "failed to read playlist binding"),
        }
    }
    bindings
}

pub fn save_binding(
    store: &dyn KvStore,
    kind: SessionKind,
    playlist_id: Option<&str>,
) -> Result<(), StorageError> {
    match playlist_id {
        Some(id) => store.set(binding_key(kind), &playlist_url(id)),
        None => store.remove(binding_key(kind)),
    }
}
