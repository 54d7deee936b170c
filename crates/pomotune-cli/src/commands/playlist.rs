use clap::Subcommand;
use pomotune_core::integrations::spotify::{parse_playlist_ref, playlist_url};
use pomotune_core::storage::settings;
use pomotune_core::SessionKind;

use crate::context::{AppContext, CliResult};

#[derive(Subcommand)]
pub enum PlaylistAction {
    /// Bind a playlist to a session kind (work, short_break, long_break)
    Bind {
        kind: SessionKind,
        /// Shareable playlist URL, spotify:playlist: URI, or bare id
        playlist: String,
    },
    /// Remove the binding for a session kind
    Unbind { kind: SessionKind },
    /// Print current bindings as JSON
    Show,
    /// List your Spotify playlists
    List {
        #[arg(long, default_value = "20")]
        limit: u32,
        #[arg(long, default_value = "0")]
        offset: u32,
    },
}

pub async fn run(action: PlaylistAction) -> CliResult {
    let ctx = AppContext::open()?;
    match action {
        PlaylistAction::Bind { kind, playlist } => {
            let id = parse_playlist_ref(&playlist)
                .ok_or_else(|| format!("not a playlist URL or id: {playlist}"))?;
            settings::save_binding(ctx.db.as_ref(), kind, Some(&id))?;
            println!("{} -> {}", kind.label(), playlist_url(&id));
        }
        PlaylistAction::Unbind { kind } => {
            settings::save_binding(ctx.db.as_ref(), kind, None)?;
            println!("{} unbound", kind.label());
        }
        PlaylistAction::Show => {
            let bindings = settings::load_bindings(ctx.db.as_ref());
            let view: serde_json::Map<String, serde_json::Value> = SessionKind::ALL
                .into_iter()
                .map(|kind| {
                    let url = bindings.get(kind).map(playlist_url);
                    (kind.as_str().to_string(), serde_json::json!(url))
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        PlaylistAction::List { limit, offset } => {
            let client = ctx.spotify()?;
            let page = client.get_user_playlists(limit, offset).await?;
            for playlist in &page.items {
                let tracks = playlist.tracks.as_ref().map(|t| t.total).unwrap_or(0);
                println!("{}  {}  ({tracks} tracks)", playlist.id, playlist.name);
            }
            println!(
                "-- {}-{} of {}",
                page.offset + 1,
                page.offset as usize + page.items.len(),
                page.total
            );
        }
    }
    Ok(())
}
