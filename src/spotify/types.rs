use serde::Deserialize;

use crate::retry::Page;

use crate::ports::catalog::{
    CatalogAlbum, CatalogArtist, CatalogPlaylist, CatalogTrack, PlaylistEntry, PlaylistOwner,
};

/// Client credentials token response
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// One page of a listing endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct Paging<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<Option<T>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistsSearch {
    pub artists: Paging<SpotifyArtist>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlbumsSearch {
    pub albums: Paging<SpotifyAlbum>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistsSearch {
    pub playlists: Paging<SpotifyPlaylist>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyImage {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyArtist {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyAlbum {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SpotifyArtist>,
    #[serde(default)]
    pub images: Vec<SpotifyImage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyTrack {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SpotifyArtist>,
    pub track_number: Option<u32>,
    /// "track" or "episode" on playlist items
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub is_local: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyUser {
    pub id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyPlaylist {
    pub id: String,
    pub name: String,
    pub owner: SpotifyUser,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub images: Vec<SpotifyImage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistItem {
    pub track: Option<SpotifyTrack>,
}

/// Spotify returns `"images": null` for playlists without a cover.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl<T> Paging<T> {
    /// Present items; `null` entries (removed objects) are dropped.
    pub fn into_items(self) -> Vec<T> {
        self.items.into_iter().flatten().collect()
    }

    /// Present items converted for the catalog, keeping the raw row count so
    /// a page with `null` rows still counts as full.
    pub fn into_page<U: From<T>>(self) -> Page<U> {
        let fetched = self.items.len();
        let items = self.items.into_iter().flatten().map(U::from).collect();
        Page::new(items, fetched)
    }
}

fn artist_names(artists: Vec<SpotifyArtist>) -> Vec<String> {
    artists.into_iter().map(|artist| artist.name).collect()
}

fn image_urls(images: Vec<SpotifyImage>) -> Vec<String> {
    images.into_iter().map(|image| image.url).collect()
}

impl From<SpotifyAlbum> for CatalogAlbum {
    fn from(album: SpotifyAlbum) -> Self {
        Self {
            id: album.id,
            name: album.name,
            artists: artist_names(album.artists),
            images: image_urls(album.images),
        }
    }
}

impl From<SpotifyTrack> for CatalogTrack {
    fn from(track: SpotifyTrack) -> Self {
        Self {
            id: track.id,
            name: track.name,
            artists: artist_names(track.artists),
            track_number: track.track_number,
        }
    }
}

impl From<SpotifyPlaylist> for CatalogPlaylist {
    fn from(playlist: SpotifyPlaylist) -> Self {
        Self {
            id: playlist.id,
            name: playlist.name,
            owner: PlaylistOwner {
                id: playlist.owner.id,
                display_name: playlist.owner.display_name,
            },
            images: image_urls(playlist.images),
        }
    }
}

impl SpotifyArtist {
    /// Artists without an id can't be looked up again and are dropped.
    pub fn into_catalog(self) -> Option<CatalogArtist> {
        Some(CatalogArtist {
            id: self.id?,
            name: self.name,
        })
    }
}

impl From<PlaylistItem> for PlaylistEntry {
    fn from(item: PlaylistItem) -> Self {
        match item.track {
            Some(track)
                if track.id.is_some()
                    && !track.is_local
                    && track.kind.as_deref().is_none_or(|kind| kind == "track") =>
            {
                PlaylistEntry::Track(track.into())
            }
            _ => PlaylistEntry::Other,
        }
    }
}
