use color_eyre::eyre::Result;

use crate::retry::Page;

/// Album as returned by the catalog. `images` are ordered largest first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CatalogAlbum {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CatalogArtist {
    pub id: String,
    pub name: String,
}

/// Track as returned by the catalog. Playlist entries may lack an id
/// (local files, removed tracks).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CatalogTrack {
    pub id: Option<String>,
    pub name: String,
    pub artists: Vec<String>,
    pub track_number: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlaylistOwner {
    pub id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CatalogPlaylist {
    pub id: String,
    pub name: String,
    pub owner: PlaylistOwner,
    pub images: Vec<String>,
}

/// One row of a playlist listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistEntry {
    Track(CatalogTrack),
    /// Episodes, unavailable tracks and anything else that isn't a track.
    Other,
}

impl CatalogTrack {
    /// Contributor names joined for display, or `None` when there are none.
    pub fn artist_display(&self) -> Option<String> {
        join_names(&self.artists)
    }
}

impl CatalogAlbum {
    pub fn artist_display(&self) -> Option<String> {
        join_names(&self.artists)
    }
}

fn join_names(names: &[String]) -> Option<String> {
    let names: Vec<&str> = names
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .collect();
    (!names.is_empty()).then(|| names.join(", "))
}

/// Pick the cover image to download: the second largest when there are at
/// least two (roughly 300x300 on Spotify), otherwise the only one.
pub fn thumbnail_url(images: &[String]) -> Option<&str> {
    match images.len() {
        0 => None,
        1 => Some(images[0].as_str()),
        n => Some(images[n - 2].as_str()),
    }
}

/// Port trait wrapping the catalog capabilities used by the retrieval modes.
///
/// Implementations live in `spotify::client` (production) or test mocks.
/// Listing methods return a single page; callers page with
/// `RetryPolicy::paginate`. A page's `fetched` count includes rows that could
/// not be turned into catalog items.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogClient: Send + Sync {
    async fn track(&self, id: &str) -> Result<CatalogTrack>;

    async fn album(&self, id: &str) -> Result<CatalogAlbum>;

    async fn playlist(&self, id: &str) -> Result<CatalogPlaylist>;

    async fn artist(&self, id: &str) -> Result<CatalogArtist>;

    async fn search_artists(&self, query: &str, limit: usize) -> Result<Vec<CatalogArtist>>;

    async fn search_albums(&self, query: &str, offset: usize, limit: usize) -> Result<Page<CatalogAlbum>>;

    async fn search_playlists(
        &self,
        query: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Page<CatalogPlaylist>>;

    async fn artist_albums(
        &self,
        artist_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Page<CatalogAlbum>>;

    async fn album_tracks(&self, album_id: &str, offset: usize, limit: usize) -> Result<Page<CatalogTrack>>;

    async fn playlist_entries(
        &self,
        playlist_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Page<PlaylistEntry>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_url() {
        let images = |urls: &[&str]| urls.iter().map(|u| u.to_string()).collect::<Vec<_>>();
        assert_eq!(thumbnail_url(&[]), None);
        assert_eq!(thumbnail_url(&images(&["640"])), Some("640"));
        assert_eq!(thumbnail_url(&images(&["640", "300"])), Some("640"));
        assert_eq!(thumbnail_url(&images(&["640", "300", "64"])), Some("300"));
    }

    #[test]
    fn test_artist_display() {
        let track = CatalogTrack {
            artists: vec!["Daft Punk".into(), " ".into(), "Pharrell Williams".into()],
            ..Default::default()
        };
        assert_eq!(track.artist_display().as_deref(), Some("Daft Punk, Pharrell Williams"));
        assert_eq!(CatalogTrack::default().artist_display(), None);
    }
}
