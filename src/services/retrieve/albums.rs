use super::{Retriever, UNKNOWN_ARTIST, create_folder, dedup_by_id};
use crate::audio_files::DOWNLOAD_EXTENSIONS;
use crate::input_list::{ListEntry, parse_entry};
use crate::normalize::names_overlap;
use crate::ports::catalog::{CatalogAlbum, CatalogClient};
use crate::ports::fetcher::{AudioFetcher, ImageFetcher};
use crate::spotify::{SpotifyKind, extract_spotify_id};
use crate::unique_path::{sanitize_filename, unique_file_base, unique_folder};

pub(super) const ALBUM_PAGE_SIZE: usize = 50;

fn album_has_artist(album: &CatalogAlbum, artist: &str) -> bool {
    album.artists.iter().any(|name| names_overlap(artist, name))
}

impl<C: CatalogClient, A: AudioFetcher, I: ImageFetcher> Retriever<'_, C, A, I> {
    pub(super) async fn retrieve_albums(&mut self, entries: &[String]) {
        for raw in entries {
            let ListEntry { name, qualifier } = parse_entry(raw);
            if name.is_empty() {
                continue;
            }
            if self.is_instrumental(&name) {
                tracing::info!("Skipping instrumental album entry: {}", name);
                self.summary.skipped += 1;
                continue;
            }

            let album = match extract_spotify_id(&name, SpotifyKind::Album) {
                Some(album_id) => {
                    let catalog = &self.catalog;
                    let album = self
                        .settings
                        .retry
                        .catalog
                        .execute(&format!("Album lookup {}", album_id), || {
                            catalog.album(&album_id)
                        })
                        .await;
                    let Some(album) = album else {
                        tracing::warn!("No album found for album ID '{}'", album_id);
                        self.summary.failed += 1;
                        continue;
                    };
                    if let Some(artist) = &qualifier
                        && !album_has_artist(&album, artist)
                    {
                        tracing::warn!("Album ID '{}' does not match artist '{}'", album_id, artist);
                        self.summary.skipped += 1;
                        continue;
                    }
                    album
                }
                None => match self.find_album(&name, qualifier.as_deref()).await {
                    Some(album) => album,
                    None => {
                        self.summary.failed += 1;
                        continue;
                    }
                },
            };

            let artist_display = album
                .artist_display()
                .or(qualifier)
                .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
            tracing::info!("Downloading album: {}", album.name);
            self.download_album(&artist_display, &album).await;
        }
    }

    /// Search albums by name; with an artist the first album credited to it
    /// wins, otherwise the first result.
    async fn find_album(&self, name: &str, artist: Option<&str>) -> Option<CatalogAlbum> {
        let catalog = &self.catalog;
        let albums = self
            .settings
            .retry
            .catalog
            .paginate(&format!("Album search '{}'", name), ALBUM_PAGE_SIZE, |offset| {
                catalog.search_albums(name, offset, ALBUM_PAGE_SIZE)
            })
            .await;
        let albums = dedup_by_id(albums, |album| album.id.as_str());
        if albums.is_empty() {
            tracing::warn!("No album found for '{}'", name);
            return None;
        }
        tracing::debug!("Found {} album candidates for '{}'", albums.len(), name);

        match artist {
            Some(artist) => {
                let found = albums.into_iter().find(|album| album_has_artist(album, artist));
                if found.is_none() {
                    tracing::warn!("No album found for '{}' with artist '{}'", name, artist);
                }
                found
            }
            None => albums.into_iter().next(),
        }
    }

    /// Download cover art and every track of `album` into a fresh folder.
    pub(super) async fn download_album(&mut self, artist_display: &str, album: &CatalogAlbum) {
        let base_dir = self.base_dir();
        let album_name = match album.name.trim() {
            "" => "Unknown Album",
            name => name,
        };
        let folder = unique_folder(&base_dir, &sanitize_filename(album_name));
        if !create_folder(&folder) {
            self.summary.failed += 1;
            return;
        }
        tracing::debug!("Album folder: {}", folder.display());

        self.download_cover(&album.images, &folder).await;

        let catalog = &self.catalog;
        let tracks = self
            .settings
            .retry
            .catalog
            .paginate(&format!("Album tracks {}", album.id), ALBUM_PAGE_SIZE, |offset| {
                catalog.album_tracks(&album.id, offset, ALBUM_PAGE_SIZE)
            })
            .await;
        if tracks.is_empty() {
            tracing::warn!("No tracks found for album: {}", album_name);
            return;
        }
        tracing::debug!("Track count for album '{}': {}", album_name, tracks.len());

        for track in tracks {
            let title = track.name.trim();
            if title.is_empty() {
                continue;
            }
            if self.is_instrumental(title) {
                tracing::info!("Skipping instrumental track: {}", title);
                self.summary.skipped += 1;
                continue;
            }

            let base_name = match track.track_number.filter(|n| *n > 0) {
                Some(number) => format!("{:02} - {}", number, sanitize_filename(title)),
                None => sanitize_filename(title),
            };
            let output_base = unique_file_base(&folder.join(base_name), DOWNLOAD_EXTENSIONS);

            tracing::info!("Downloading track: {}", title);
            self.download_track(&format!("{} - {}", artist_display, title), &output_base)
                .await;
        }
    }
}
