pub mod oauth;
pub mod playback;
pub mod spotify;

pub use oauth::{AuthorizationRequest, CallbackParams};
pub use playback::PlaybackSync;
pub use spotify::{PlaylistBindings, SpotifyClient};
