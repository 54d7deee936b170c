//! Shared state for a single CLI invocation: the database, configuration and
//! the persisted engine.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use pomotune_core::storage::settings;
use pomotune_core::{
    Clock, Config, Database, Event, IntervalEngine, KvStore, PlaybackSync, SpotifyClient,
    SystemClock,
};

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

const ENGINE_KEY: &str = "timer.engine";
/// Epoch millis of the last engine save, used to catch up a running engine
/// between invocations.
const ENGINE_SAVED_AT_KEY: &str = "timer.engine_saved_at";

pub struct AppContext {
    pub db: Arc<Database>,
    pub config: Config,
    pub clock: Arc<dyn Clock>,
}

impl AppContext {
    pub fn open() -> CliResult<Self> {
        Ok(Self {
            db: Arc::new(Database::open()?),
            config: Config::load()?,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn store(&self) -> Arc<dyn KvStore> {
        self.db.clone()
    }

    pub fn spotify(&self) -> CliResult<Arc<SpotifyClient>> {
        let client = SpotifyClient::new(self.config.spotify.clone(), self.store(), self.clock.clone())?;
        Ok(Arc::new(client))
    }

    /// Playback sync for the current bindings, or `None` when Spotify is not
    /// set up. Never fails: the timer works without music.
    pub fn playback_sync(&self) -> Option<Arc<PlaybackSync>> {
        match self.spotify() {
            Ok(client) if client.has_session() => {
                let bindings = settings::load_bindings(self.db.as_ref());
                Some(Arc::new(PlaybackSync::new(client, bindings)))
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "spotify client unavailable");
                None
            }
        }
    }

    /// Load the persisted engine with the current durations and policy
    /// applied. A running engine is advanced by the time since it was saved.
    pub fn load_engine(&self) -> CliResult<IntervalEngine> {
        let durations = settings::load_durations(self.db.as_ref());
        let stored = self
            .db
            .kv_get(ENGINE_KEY)?
            .and_then(|json| match serde_json::from_str::<IntervalEngine>(&json) {
                Ok(engine) => Some(engine),
                Err(e) => {
                    tracing::warn!(error = %e, "discarding unreadable engine state");
                    None
                }
            });

        let mut engine = stored.unwrap_or_else(|| IntervalEngine::new(durations));
        engine.set_durations(durations)?;
        let engine = engine
            .with_long_break_every(self.config.timer.long_break_every)?
            .with_auto_continue(self.config.timer.auto_continue);
        Ok(engine)
    }

    /// Seconds since the engine was last saved, zero if unknown.
    pub fn secs_since_save(&self) -> CliResult<u64> {
        let saved_at = self
            .db
            .kv_get(ENGINE_SAVED_AT_KEY)?
            .and_then(|raw| raw.parse::<i64>().ok())
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());
        Ok(saved_at
            .map(|at| (self.clock.now() - at).num_seconds().max(0) as u64)
            .unwrap_or(0))
    }

    pub fn save_engine(&self, engine: &IntervalEngine) -> CliResult {
        let json = serde_json::to_string(engine)?;
        self.db.kv_set(ENGINE_KEY, &json)?;
        self.db
            .kv_set(ENGINE_SAVED_AT_KEY, &self.clock.now().timestamp_millis().to_string())?;
        Ok(())
    }
}

/// Advance a running engine by `elapsed_secs` nobody was driving it for. A
/// completed session is printed and handed to playback sync.
pub async fn catch_up(
    engine: &mut IntervalEngine,
    elapsed_secs: u64,
    sync: Option<&PlaybackSync>,
) -> CliResult<Option<Event>> {
    let Some(event) = engine.advance(elapsed_secs) else {
        return Ok(None);
    };
    println!("{}", serde_json::to_string_pretty(&event)?);
    if let Some(sync) = sync {
        sync.handle(&event).await;
    }
    Ok(Some(event))
}
