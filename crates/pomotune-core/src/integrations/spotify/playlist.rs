use serde::{Deserialize, Serialize};

use crate::timer::SessionKind;

/// Pull the playlist id out of a shareable URL such as
/// `https://open.spotify.com/playlist/37i9dQZF1?si=...`.
///
/// Returns `None` when the text does not contain `playlist/<id>`.
pub fn extract_playlist_id(url: &str) -> Option<String> {
    let start = url.find("playlist/")? + "playlist/".len();
    let id: String = url[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

/// Accept a shareable URL, a `spotify:playlist:<id>` URI, or a bare id.
pub fn parse_playlist_ref(input: &str) -> Option<String> {
    let input = input.trim();
    if let Some(id) = extract_playlist_id(input) {
        return Some(id);
    }
    if let Some(id) = input.strip_prefix("spotify:playlist:") {
        return is_playlist_id(id).then(|| id.to_string());
    }
    is_playlist_id(input).then(|| input.to_string())
}

fn is_playlist_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())
}

pub fn playlist_url(id: &str) -> String {
    format!("https://open.spotify.com/playlist/{id}")
}

pub fn playlist_uri(id: &str) -> String {
    format!("spotify:playlist:{id}")
}

/// Which playlist plays during each session kind. Unbound kinds leave
/// playback alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistBindings {
    pub work: Option<String>,
    pub short_break: Option<String>,
    pub long_break: Option<String>,
}

impl PlaylistBindings {
    pub fn get(&self, kind: SessionKind) -> Option<&str> {
        match kind {
            SessionKind::Work => self.work.as_deref(),
            SessionKind::ShortBreak => self.short_break.as_deref(),
            SessionKind::LongBreak => self.long_break.as_deref(),
        }
    }

    pub fn set(&mut self, kind: SessionKind, playlist_id: Option<String>) {
        let slot = match kind {
            SessionKind::Work => &mut self.work,
            SessionKind::ShortBreak => &mut self.short_break,
            SessionKind::LongBreak => &mut self.long_break,
        };
        *slot = playlist_id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_id_from_share_url() {
        assert_eq!(
            extract_playlist_id("https://open.spotify.com/playlist/37i9dQZF1").as_deref(),
            Some("37i9dQZF1")
        );
        assert_eq!(
            extract_playlist_id("https://open.spotify.com/playlist/37i9dQZF1DX8Uebhn9wzrS?si=abc")
                .as_deref(),
            Some("37i9dQZF1DX8Uebhn9wzrS")
        );
    }

    #[test]
    fn non_matching_url_is_none() {
        assert_eq!(extract_playlist_id("https://open.spotify.com/album/123"), None);
        assert_eq!(extract_playlist_id("https://open.spotify.com/playlist/"), None);
        assert_eq!(extract_playlist_id(""), None);
    }

    #[test]
    fn parses_all_reference_forms() {
        assert_eq!(parse_playlist_ref("spotify:playlist:abc123").as_deref(), Some("abc123"));
        assert_eq!(parse_playlist_ref(" abc123 ").as_deref(), Some("abc123"));
        assert_eq!(parse_playlist_ref("not a playlist"), None);
    }

    #[test]
    fn bindings_by_kind() {
        let mut b = PlaylistBindings::default();
        b.set(SessionKind::LongBreak, Some("chill".into()));
        assert_eq!(b.get(SessionKind::LongBreak), Some("chill"));
        assert_eq!(b.get(SessionKind::Work), None);
    }
}
