use std::path::Path;

use super::{Retriever, UNKNOWN_ARTIST, create_folder, dedup_by_id};
use crate::audio_files::DOWNLOAD_EXTENSIONS;
use crate::input_list::{ListEntry, parse_entry};
use crate::normalize::names_overlap;
use crate::ports::catalog::{CatalogClient, CatalogPlaylist, PlaylistEntry};
use crate::ports::fetcher::{AudioFetcher, ImageFetcher};
use crate::spotify::{SpotifyKind, extract_spotify_id};
use crate::unique_path::{sanitize_filename, unique_file_base, unique_folder};

const PLAYLISTS_FOLDER: &str = "Playlists";
const PLAYLIST_FILENAME: &str = "playlist.m3u";
const SEARCH_PAGE_SIZE: usize = 50;
const ITEMS_PAGE_SIZE: usize = 100;

fn playlist_has_owner(playlist: &CatalogPlaylist, owner: &str) -> bool {
    names_overlap(owner, &playlist.owner.id)
        || playlist
            .owner
            .display_name
            .as_deref()
            .is_some_and(|display_name| names_overlap(owner, display_name))
}

/// Extended M3U listing `(title, relative path)` pairs in order.
pub fn render_m3u(entries: &[(String, String)]) -> String {
    let mut out = String::from("#EXTM3U\n");
    for (title, path) in entries {
        out.push_str(&format!("#EXTINF:-1,{}\n{}\n", title, path));
    }
    out
}

fn write_m3u(folder: &Path, entries: &[(String, String)]) {
    if entries.is_empty() {
        return;
    }
    let path = folder.join(PLAYLIST_FILENAME);
    match std::fs::write(&path, render_m3u(entries)) {
        Ok(()) => tracing::info!("Wrote playlist file: {}", path.display()),
        Err(e) => tracing::warn!("Failed to write {}: {}", path.display(), e),
    }
}

impl<C: CatalogClient, A: AudioFetcher, I: ImageFetcher> Retriever<'_, C, A, I> {
    pub(super) async fn retrieve_playlists(&mut self, entries: &[String]) {
        for raw in entries {
            let ListEntry { name, qualifier } = parse_entry(raw);
            if name.is_empty() {
                continue;
            }

            let playlist = match extract_spotify_id(&name, SpotifyKind::Playlist) {
                Some(playlist_id) => {
                    let catalog = &self.catalog;
                    let playlist = self
                        .settings
                        .retry
                        .catalog
                        .execute(&format!("Playlist lookup {}", playlist_id), || {
                            catalog.playlist(&playlist_id)
                        })
                        .await;
                    let Some(playlist) = playlist else {
                        tracing::warn!("No playlist found for playlist ID '{}'", playlist_id);
                        self.summary.failed += 1;
                        continue;
                    };
                    if let Some(owner) = &qualifier
                        && !playlist_has_owner(&playlist, owner)
                    {
                        tracing::warn!(
                            "Playlist ID '{}' does not match owner '{}'",
                            playlist_id,
                            owner
                        );
                        self.summary.skipped += 1;
                        continue;
                    }
                    playlist
                }
                None => match self.find_playlist(&name, qualifier.as_deref()).await {
                    Some(playlist) => playlist,
                    None => {
                        self.summary.failed += 1;
                        continue;
                    }
                },
            };

            tracing::info!("Downloading playlist: {}", playlist.name);
            self.download_playlist(&playlist).await;
        }
    }

    async fn find_playlist(&self, name: &str, owner: Option<&str>) -> Option<CatalogPlaylist> {
        let catalog = &self.catalog;
        let playlists = self
            .settings
            .retry
            .catalog
            .paginate(&format!("Playlist search '{}'", name), SEARCH_PAGE_SIZE, |offset| {
                catalog.search_playlists(name, offset, SEARCH_PAGE_SIZE)
            })
            .await;
        let playlists = dedup_by_id(playlists, |playlist| playlist.id.as_str());
        if playlists.is_empty() {
            tracing::warn!("No playlist found for '{}'", name);
            return None;
        }
        tracing::debug!("Found {} playlist candidates for '{}'", playlists.len(), name);

        match owner {
            Some(owner) => {
                let found = playlists
                    .into_iter()
                    .find(|playlist| playlist_has_owner(playlist, owner));
                if found.is_none() {
                    tracing::warn!("No playlist found for '{}' with owner '{}'", name, owner);
                }
                found
            }
            None => playlists.into_iter().next(),
        }
    }

    async fn download_playlist(&mut self, playlist: &CatalogPlaylist) {
        let playlist_name = match playlist.name.trim() {
            "" => "Unknown Playlist",
            name => name,
        };
        let root = self.base_dir().join(PLAYLISTS_FOLDER);
        let folder = unique_folder(&root, &sanitize_filename(playlist_name));
        if !create_folder(&folder) {
            self.summary.failed += 1;
            return;
        }
        tracing::debug!("Playlist folder: {}", folder.display());

        self.download_cover(&playlist.images, &folder).await;

        let catalog = &self.catalog;
        let items = self
            .settings
            .retry
            .catalog
            .paginate(&format!("Playlist items {}", playlist.id), ITEMS_PAGE_SIZE, |offset| {
                catalog.playlist_entries(&playlist.id, offset, ITEMS_PAGE_SIZE)
            })
            .await;

        let total = items.len();
        let tracks: Vec<_> = items
            .into_iter()
            .filter_map(|entry| match entry {
                PlaylistEntry::Track(track) if track.id.is_some() => Some(track),
                _ => None,
            })
            .collect();
        let not_tracks = total - tracks.len();
        if not_tracks > 0 {
            tracing::warn!(
                "Skipped {} playlist entries without a downloadable track in '{}'",
                not_tracks,
                playlist_name
            );
            self.summary.skipped += not_tracks;
        }
        if tracks.is_empty() {
            tracing::warn!("No tracks found for playlist: {}", playlist_name);
            return;
        }
        tracing::debug!("Track count for playlist '{}': {}", playlist_name, tracks.len());

        let mut listing = Vec::new();
        for (index, track) in tracks.iter().enumerate() {
            let title = track.name.trim();
            if title.is_empty() {
                continue;
            }
            if self.is_instrumental(title) {
                tracing::info!("Skipping instrumental track: {}", title);
                self.summary.skipped += 1;
                continue;
            }

            let artists = track.artist_display();
            let query = match &artists {
                Some(artists) => format!("{} - {}", artists, title),
                None => title.to_string(),
            };
            let base_name = format!(
                "{:03} - {} - {}",
                index + 1,
                artists.as_deref().map(sanitize_filename).unwrap_or_else(|| "Unknown".to_string()),
                sanitize_filename(title)
            );
            let output_base = unique_file_base(&folder.join(base_name), DOWNLOAD_EXTENSIONS);

            tracing::info!("Downloading playlist track: {}", title);
            let Some(stored) = self.download_track(&query, &output_base).await else {
                continue;
            };
            let Ok(relative) = stored.strip_prefix(&folder) else {
                continue;
            };
            listing.push((
                format!("{} - {}", artists.as_deref().unwrap_or(UNKNOWN_ARTIST), title),
                relative.to_string_lossy().replace('\\', "/"),
            ));
        }

        write_m3u(&folder, &listing);
    }
}
