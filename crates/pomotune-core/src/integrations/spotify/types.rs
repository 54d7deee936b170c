use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    pub name: String,
    #[serde(rename = "type", default)]
    pub device_type: String,
    #[serde(default)]
    pub volume_percent: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DeviceList {
    pub devices: Vec<Device>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    /// Empty for podcast episodes.
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub uri: Option<String>,
}

/// `GET /me/player` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    #[serde(default)]
    pub device: Option<Device>,
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub item: Option<Track>,
}

/// Display-only view of what is playing. May be stale by up to one poll
/// interval.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub track_name: Option<String>,
    pub artist_names: Vec<String>,
    pub is_playing: bool,
    pub device_id: Option<String>,
    pub volume_percent: Option<u32>,
}

impl From<&PlaybackState> for PlaybackSnapshot {
    fn from(state: &PlaybackState) -> Self {
        Self {
            track_name: state.item.as_ref().map(|t| t.name.clone()),
            artist_names: state
                .item
                .as_ref()
                .map(|t| t.artists.iter().map(|a| a.name.clone()).collect())
                .unwrap_or_default(),
            is_playing: state.is_playing,
            device_id: state.device.as_ref().and_then(|d| d.id.clone()),
            volume_percent: state.device.as_ref().and_then(|d| d.volume_percent),
        }
    }
}

impl PlaybackSnapshot {
    /// `Track - Artist, Artist`, or None when nothing is loaded.
    pub fn now_playing(&self) -> Option<String> {
        let track = self.track_name.as_ref()?;
        if self.artist_names.is_empty() {
            Some(track.clone())
        } else {
            Some(format!("{track} - {}", self.artist_names.join(", ")))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub images: Vec<Image>,
}

impl UserProfile {
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistOwner {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackCount {
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub uri: String,
    #[serde(default)]
    pub owner: Option<PlaylistOwner>,
    #[serde(default)]
    pub tracks: Option<TrackCount>,
}

/// Spotify paging object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub next: Option<String>,
}

/// What the shell shows right after connecting.
#[derive(Debug, Clone, Serialize)]
pub struct AccountOverview {
    pub profile: UserProfile,
    pub devices: Vec<Device>,
    pub playlists: Vec<Playlist>,
}
