//! Follows engine events with Spotify playback.
//!
//! Everything here is best effort. A failed switch is logged and the timer
//! carries on; nothing flows back into the engine.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use super::spotify::{PlaybackSnapshot, PlaylistBindings, SpotifyClient};
use crate::error::SpotifyError;
use crate::events::Event;
use crate::timer::SessionKind;

pub struct PlaybackSync {
    client: Arc<SpotifyClient>,
    bindings: PlaylistBindings,
    pause_with_timer: bool,
    device: Mutex<Option<String>>,
    snapshot: Mutex<Option<PlaybackSnapshot>>,
}

impl PlaybackSync {
    pub fn new(client: Arc<SpotifyClient>, bindings: PlaylistBindings) -> Self {
        let pause_with_timer = client.config().pause_with_timer;
        Self {
            client,
            bindings,
            pause_with_timer,
            device: Mutex::new(None),
            snapshot: Mutex::new(None),
        }
    }

    /// React to an engine event. Never fails.
    pub async fn handle(&self, event: &Event) {
        let result = match event {
            Event::SessionStarted { kind, .. } | Event::SessionChanged { to: kind, .. } => {
                self.switch_to(*kind).await.map(|_| ())
            }
            Event::SessionPaused { .. } if self.pause_with_timer => self.pause().await,
            Event::SessionPaused { .. } | Event::SessionReset { .. } => Ok(()),
        };
        if let Err(e) = result {
            warn!(error = %e, kind = %event.current_kind(), "playback sync failed");
        }
    }

    /// Play the playlist bound to `kind`. Returns `false` when nothing is
    /// bound or no session exists.
    pub async fn switch_to(&self, kind: SessionKind) -> Result<bool, SpotifyError> {
        let Some(playlist_id) = self.bindings.get(kind) else {
            debug!(%kind, "no playlist bound");
            return Ok(false);
        };
        if !self.client.has_session() {
            debug!("not connected to spotify, skipping playlist switch");
            return Ok(false);
        }
        let device = self.device().await?;
        let played = self
            .client
            .play_playlist(playlist_id, device.as_deref())
            .await;
        self.forget_missing_device(played)?;
        info!(%kind, playlist_id, "switched playlist");
        Ok(true)
    }

    async fn pause(&self) -> Result<(), SpotifyError> {
        if !self.client.has_session() {
            return Ok(());
        }
        let device = self.device().await?;
        let paused = self.client.pause(device.as_deref()).await;
        self.forget_missing_device(paused)
    }

    /// A 404 means the cached device went away; resolve again next time.
    fn forget_missing_device<T>(&self, result: Result<T, SpotifyError>) -> Result<T, SpotifyError> {
        if let Err(e) = &result {
            if e.status() == Some(404) {
                debug!("target device not found, clearing cached device");
                *self.device.lock().unwrap_or_else(|p| p.into_inner()) = None;
            }
        }
        result
    }

    async fn device(&self) -> Result<Option<String>, SpotifyError> {
        let cached = self.device.lock().unwrap_or_else(|e| e.into_inner()).clone();
        if cached.is_some() {
            return Ok(cached);
        }
        let resolved = self.client.resolve_device().await?;
        *self.device.lock().unwrap_or_else(|e| e.into_inner()) = resolved.clone();
        Ok(resolved)
    }

    /// Refresh the now-playing snapshot. Failures keep the previous one.
    pub async fn poll(&self) -> Option<PlaybackSnapshot> {
        if !self.client.has_session() {
            return None;
        }
        match self.client.get_playback_snapshot().await {
            Ok(snapshot) => {
                *self.snapshot.lock().unwrap_or_else(|e| e.into_inner()) = snapshot.clone();
                snapshot
            }
            Err(e) => {
                warn!(error = %e, "playback poll failed");
                self.last_snapshot()
            }
        }
    }

    pub fn last_snapshot(&self) -> Option<PlaybackSnapshot> {
        self.snapshot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
