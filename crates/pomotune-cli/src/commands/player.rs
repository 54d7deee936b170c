use clap::Subcommand;
use pomotune_core::integrations::spotify::parse_playlist_ref;

use crate::context::{AppContext, CliResult};

#[derive(Subcommand)]
pub enum PlayerAction {
    /// Print what is playing as JSON
    Status,
    /// List available playback devices
    Devices,
    /// Resume playback, or start a playlist
    Play {
        /// Playlist URL, URI or id to start
        #[arg(long)]
        playlist: Option<String>,
    },
    /// Pause playback
    Pause,
    /// Set playback volume
    Volume {
        /// Volume in percent (0-100)
        percent: u32,
    },
}

pub async fn run(action: PlayerAction) -> CliResult {
    let ctx = AppContext::open()?;
    let client = ctx.spotify()?;

    match action {
        PlayerAction::Status => match client.get_playback_snapshot().await? {
            Some(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
            None => println!("nothing playing"),
        },
        PlayerAction::Devices => {
            for device in client.get_devices().await? {
                let marker = if device.is_active { "*" } else { " " };
                let volume = device
                    .volume_percent
                    .map(|v| format!("{v}%"))
                    .unwrap_or_else(|| "-".into());
                println!(
                    "{marker} {}  {} ({})  vol {volume}",
                    device.id.as_deref().unwrap_or("?"),
                    device.name,
                    device.device_type
                );
            }
        }
        PlayerAction::Play { playlist } => {
            let device = client.resolve_device().await?;
            match playlist {
                Some(raw) => {
                    let id = parse_playlist_ref(&raw)
                        .ok_or_else(|| format!("not a playlist URL or id: {raw}"))?;
                    client.play_playlist(&id, device.as_deref()).await?;
                }
                None => client.play(device.as_deref(), None, None).await?,
            }
            println!("playing");
        }
        PlayerAction::Pause => {
            let device = client.resolve_device().await?;
            client.pause(device.as_deref()).await?;
            println!("paused");
        }
        PlayerAction::Volume { percent } => {
            let device = client.resolve_device().await?;
            client.set_volume(percent, device.as_deref()).await?;
            println!("volume {percent}%");
        }
    }
    Ok(())
}
