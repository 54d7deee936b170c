//! TOML-based application configuration.
//!
//! Stores settings that are not user-facing session data:
//! - Long-break cadence and the auto-continue policy
//! - Spotify application credentials and endpoints
//! - Playback poll interval and device preference
//!
//! Configuration is stored at `~/.config/pomotune/config.toml`. Durations and
//! playlist bindings live in the key-value store instead (see
//! [`super::settings`]).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;
use crate::timer::DEFAULT_LONG_BREAK_EVERY;

pub const CLIENT_ID_ENV: &str = "POMOTUNE_SPOTIFY_CLIENT_ID";

/// Interval-engine policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_long_break_every")]
    pub long_break_every: u32,
    /// Keep the countdown running across session boundaries.
    #[serde(default)]
    pub auto_continue: bool,
}

/// Spotify application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_accounts_url")]
    pub accounts_url: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Pause music when the timer is paused.
    #[serde(default)]
    pub pause_with_timer: bool,
    /// Preferred playback device; falls back to the active device.
    #[serde(default)]
    pub device_id: Option<String>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/pomotune/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub spotify: SpotifyConfig,
}

fn default_long_break_every() -> u32 {
    DEFAULT_LONG_BREAK_EVERY
}
fn default_redirect_uri() -> String {
    "http://127.0.0.1:8888/callback".into()
}
fn default_scopes() -> Vec<String> {
    [
        "user-read-playback-state",
        "user-modify-playback-state",
        "user-read-currently-playing",
        "playlist-read-private",
        "playlist-read-collaborative",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_accounts_url() -> String {
    "https://accounts.spotify.com".into()
}
fn default_api_url() -> String {
    "https://api.spotify.com/v1".into()
}
fn default_poll_interval_secs() -> u64 {
    5
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            long_break_every: default_long_break_every(),
            auto_continue: false,
        }
    }
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            redirect_uri: default_redirect_uri(),
            scopes: default_scopes(),
            accounts_url: default_accounts_url(),
            api_url: default_api_url(),
            poll_interval_secs: default_poll_interval_secs(),
            pause_with_timer: false,
            device_id: None,
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }
        key.split('.').try_fold(root, |node, part| node.get(part))
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let (parent_path, leaf) = match key.rsplit_once('.') {
            Some((parent, leaf)) => (Some(parent), leaf),
            None => (None, key),
        };
        if leaf.is_empty() {
            return Err(unknown());
        }

        let mut parent = root;
        if let Some(path) = parent_path {
            for part in path.split('.') {
                parent = parent.get_mut(part).ok_or_else(unknown)?;
            }
        }
        let obj = parent.as_object_mut().ok_or_else(unknown)?;
        let existing = obj.get(leaf).ok_or_else(unknown)?;

        let new_value = match existing {
            serde_json::Value::Bool(_) => serde_json::Value::Bool(
                value
                    .parse::<bool>()
                    .map_err(|e| invalid(e.to_string()))?,
            ),
            serde_json::Value::Number(_) => serde_json::Value::Number(
                value
                    .parse::<u64>()
                    .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?
                    .into(),
            ),
            serde_json::Value::Array(_) => serde_json::Value::Array(
                value
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|s| !s.is_empty())
                    .map(|s| serde_json::Value::String(s.to_string()))
                    .collect(),
            ),
            // Optional fields serialize as null; "none" clears them.
            serde_json::Value::Null if value.eq_ignore_ascii_case("none") => serde_json::Value::Null,
            serde_json::Value::Object(_) => return Err(unknown()),
            _ => serde_json::Value::String(value.into()),
        };

        obj.insert(leaf.to_string(), new_value);
        Ok(())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        data_dir()
            .map(|dir| dir.join("config.toml"))
            .map_err(|e| ConfigError::LoadFailed {
                path: PathBuf::from("~/.config/pomotune"),
                message: e.to_string(),
            })
    }

    /// Load from the default location, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let mut cfg = Self::load_file()?;
        cfg.apply_env();
        Ok(cfg)
    }

    /// Load the file as written, without environment overrides.
    pub fn load_file() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults if the file is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Self = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    fn apply_env(&mut self) {
        if let Ok(id) = std::env::var(CLIENT_ID_ENV) {
            if !id.is_empty() {
                self.spotify.client_id = id;
            }
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without persisting. Returns error if the
    /// key is unknown or the value does not fit its type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timer.long_break_every == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timer.long_break_every".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.spotify.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "spotify.poll_interval_secs".into(),
                message: "must be at least 1".into(),
            });
        }
        url::Url::parse(&self.spotify.redirect_uri).map_err(|e| ConfigError::InvalidValue {
            key: "spotify.redirect_uri".into(),
            message: e.to_string(),
        })?;
        Ok(())
    }
}
