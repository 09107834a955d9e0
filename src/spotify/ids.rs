use std::sync::OnceLock;

use regex::Regex;

/// Kinds of Spotify objects that can be referenced from an input list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpotifyKind {
    Track,
    Album,
    Playlist,
    Artist,
}

impl SpotifyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SpotifyKind::Track => "track",
            SpotifyKind::Album => "album",
            SpotifyKind::Playlist => "playlist",
            SpotifyKind::Artist => "artist",
        }
    }
}

fn reference_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(
            r"(?:spotify:(?P<uri_kind>[a-z]+):|open\.spotify\.com/(?:intl-[A-Za-z-]+/)?(?P<url_kind>[a-z]+)/)(?P<id>[A-Za-z0-9]{22})",
        )
        .expect("Spotify reference regex is valid")
    })
}

fn is_bare_id(text: &str) -> bool {
    text.len() == 22 && text.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Extract a catalog id of the given kind from a `spotify:<kind>:<id>` URI,
/// an `open.spotify.com/<kind>/<id>` URL or a bare 22 character id.
///
/// A reference to a different kind yields `None`, so the entry is treated as
/// a name.
pub fn extract_spotify_id(text: &str, kind: SpotifyKind) -> Option<String> {
    let text = text.trim();
    if is_bare_id(text) {
        return Some(text.to_string());
    }

    let captures = reference_regex().captures(text)?;
    let found_kind = captures
        .name("uri_kind")
        .or_else(|| captures.name("url_kind"))?
        .as_str();
    if found_kind != kind.as_str() {
        return None;
    }
    captures.name("id").map(|id| id.as_str().to_string())
}
