mod config;
pub mod database;
pub mod kv;
pub mod settings;

pub use config::{Config, SpotifyConfig, TimerConfig};
pub use database::Database;
pub use kv::{KvStore, MemoryStore};

use std::path::PathBuf;

/// Returns `~/.config/pomotune[-dev]/` based on POMOTUNE_ENV.
///
/// Set POMOTUNE_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("POMOTUNE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("pomotune-dev")
    } else {
        base_dir.join("pomotune")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
