//! Spotify integration: PKCE session, Web API client, playlist helpers.

mod client;
pub mod playlist;
pub mod session;
pub mod types;

pub use client::{pick_device, SpotifyClient, OVERVIEW_PLAYLIST_LIMIT};
pub use playlist::{
    extract_playlist_id, parse_playlist_ref, playlist_uri, playlist_url, PlaylistBindings,
};
pub use session::{AuthSession, PendingAuthorization};
pub use types::{
    AccountOverview, Artist, Device, Image, Page, PlaybackSnapshot, PlaybackState, Playlist,
    PlaylistOwner, Track, TrackCount, UserProfile,
};
