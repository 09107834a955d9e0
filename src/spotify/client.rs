use std::num::NonZeroU32;
use std::time::Duration;

use color_eyre::Result;
use color_eyre::eyre::Context;
use governor::{
    Quota, RateLimiter, clock::DefaultClock, state::InMemoryState, state::direct::NotKeyed,
};
use serde::de::DeserializeOwned;

use crate::ports::catalog::{
    CatalogAlbum, CatalogArtist, CatalogClient, CatalogPlaylist, CatalogTrack, PlaylistEntry,
};
use crate::retry::Page;
use crate::spotify::auth::{CatalogError, ClientCredentials};
use crate::spotify::types::{
    AlbumsSearch, ArtistsSearch, Paging, PlaylistItem, PlaylistsSearch, SpotifyAlbum,
    SpotifyArtist, SpotifyPlaylist, SpotifyTrack,
};

const SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Spotify Web API client for public catalog data
pub struct SpotifyCatalog {
    client: reqwest::Client,
    credentials: ClientCredentials,
    rate_limiter: DirectRateLimiter,
    timeout: Duration,
    market: Option<String>,
}

impl SpotifyCatalog {
    pub fn new(
        client_id: String,
        client_secret: String,
        timeout: Duration,
        market: Option<String>,
    ) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(10).unwrap_or(NonZeroU32::MIN));
        Self {
            client: reqwest::Client::new(),
            credentials: ClientCredentials::new(client_id, client_secret),
            rate_limiter: RateLimiter::direct(quota),
            timeout,
            market,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", SPOTIFY_API_URL, path);
        let access_token = self
            .credentials
            .access_token(&self.client, self.timeout)
            .await?;

        self.rate_limiter.until_ready().await;
        tracing::debug!(url = %url, ?query, "Spotify request");

        let response = self
            .client
            .get(&url)
            .query(query)
            .bearer_auth(&access_token)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(CatalogError::FailedToSendRequest)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            // Force a fresh token on the next attempt
            self.credentials.invalidate().await;
        }
        if !status.is_success() {
            return Err(CatalogError::Status { status, url }.into());
        }

        let body = response
            .json()
            .await
            .map_err(CatalogError::FailedToParseResponse)
            .wrap_err_with(|| format!("Unexpected response from {}", url))?;
        Ok(body)
    }

    async fn search<T: DeserializeOwned>(
        &self,
        field: &str,
        name: &str,
        offset: usize,
        limit: usize,
    ) -> Result<T> {
        self.get_json(
            "/search",
            &[
                ("q", format!("{}:{}", field, name)),
                ("type", field.to_string()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ],
        )
        .await
    }
}

fn paging(offset: usize, limit: usize) -> Vec<(&'static str, String)> {
    vec![("limit", limit.to_string()), ("offset", offset.to_string())]
}

#[async_trait::async_trait]
impl CatalogClient for SpotifyCatalog {
    async fn track(&self, id: &str) -> Result<CatalogTrack> {
        let track: SpotifyTrack = self.get_json(&format!("/tracks/{}", id), &[]).await?;
        Ok(track.into())
    }

    async fn album(&self, id: &str) -> Result<CatalogAlbum> {
        let album: SpotifyAlbum = self.get_json(&format!("/albums/{}", id), &[]).await?;
        Ok(album.into())
    }

    async fn playlist(&self, id: &str) -> Result<CatalogPlaylist> {
        let playlist: SpotifyPlaylist = self
            .get_json(
                &format!("/playlists/{}", id),
                &[("fields", "id,name,owner(id,display_name),images".to_string())],
            )
            .await?;
        Ok(playlist.into())
    }

    async fn artist(&self, id: &str) -> Result<CatalogArtist> {
        let artist: SpotifyArtist = self.get_json(&format!("/artists/{}", id), &[]).await?;
        Ok(CatalogArtist {
            id: artist.id.unwrap_or_else(|| id.to_string()),
            name: artist.name,
        })
    }

    async fn search_artists(&self, query: &str, limit: usize) -> Result<Vec<CatalogArtist>> {
        let results: ArtistsSearch = self.search("artist", query, 0, limit).await?;
        Ok(results
            .artists
            .into_items()
            .into_iter()
            .filter_map(SpotifyArtist::into_catalog)
            .collect())
    }

    async fn search_albums(&self, query: &str, offset: usize, limit: usize) -> Result<Page<CatalogAlbum>> {
        let results: AlbumsSearch = self.search("album", query, offset, limit).await?;
        Ok(results.albums.into_page())
    }

    async fn search_playlists(
        &self,
        query: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Page<CatalogPlaylist>> {
        let results: PlaylistsSearch = self.search("playlist", query, offset, limit).await?;
        Ok(results.playlists.into_page())
    }

    async fn artist_albums(
        &self,
        artist_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Page<CatalogAlbum>> {
        let mut query = paging(offset, limit);
        query.push(("include_groups", "album,single".to_string()));
        if let Some(market) = &self.market {
            query.push(("market", market.clone()));
        }
        let page: Paging<SpotifyAlbum> = self
            .get_json(&format!("/artists/{}/albums", artist_id), &query)
            .await?;
        Ok(page.into_page())
    }

    async fn album_tracks(&self, album_id: &str, offset: usize, limit: usize) -> Result<Page<CatalogTrack>> {
        let page: Paging<SpotifyTrack> = self
            .get_json(&format!("/albums/{}/tracks", album_id), &paging(offset, limit))
            .await?;
        Ok(page.into_page())
    }

    async fn playlist_entries(
        &self,
        playlist_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Page<PlaylistEntry>> {
        let mut query = paging(offset, limit);
        query.push(("additional_types", "track".to_string()));
        let page: Paging<PlaylistItem> = self
            .get_json(&format!("/playlists/{}/tracks", playlist_id), &query)
            .await?;
        // Null rows stay as `Other` so they are reported as skipped entries
        let entries: Vec<PlaylistEntry> = page
            .items
            .into_iter()
            .map(|item| item.map(Into::into).unwrap_or(PlaylistEntry::Other))
            .collect();
        Ok(entries.into())
    }
}
