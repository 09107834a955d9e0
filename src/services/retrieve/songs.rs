use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{Retriever, UNKNOWN_ARTIST, create_folder};
use crate::audio_files::DOWNLOAD_EXTENSIONS;
use crate::input_list::{ListEntry, parse_entry};
use crate::normalize::names_overlap;
use crate::ports::catalog::CatalogClient;
use crate::ports::fetcher::{AudioFetcher, ImageFetcher};
use crate::spotify::{SpotifyKind, extract_spotify_id};
use crate::unique_path::{sanitize_filename, unique_file, unique_file_base};

impl<C: CatalogClient, A: AudioFetcher, I: ImageFetcher> Retriever<'_, C, A, I> {
    /// Download single songs into the library root, then group artists with
    /// at least two new songs into their own folder.
    pub(super) async fn retrieve_songs(&mut self, entries: &[String]) {
        let base_dir = self.base_dir();
        let mut downloaded: Vec<(String, PathBuf)> = Vec::new();

        for raw in entries {
            let ListEntry { name, qualifier } = parse_entry(raw);
            if name.is_empty() {
                continue;
            }

            let (title, artist) = match extract_spotify_id(&name, SpotifyKind::Track) {
                Some(track_id) => {
                    let catalog = &self.catalog;
                    let track = self
                        .settings
                        .retry
                        .catalog
                        .execute(&format!("Track lookup {}", track_id), || {
                            catalog.track(&track_id)
                        })
                        .await;
                    let Some(track) = track else {
                        tracing::warn!("No track found for track ID '{}'", track_id);
                        self.summary.failed += 1;
                        continue;
                    };
                    if let Some(artist) = &qualifier
                        && !track.artists.iter().any(|a| names_overlap(artist, a))
                    {
                        tracing::warn!(
                            "Track ID '{}' does not match artist '{}'",
                            track_id,
                            artist
                        );
                        self.summary.skipped += 1;
                        continue;
                    }
                    let title = match track.name.trim() {
                        "" => name.clone(),
                        title => title.to_string(),
                    };
                    let artist = track
                        .artist_display()
                        .or(qualifier)
                        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
                    (title, Some(artist))
                }
                None => (name, qualifier),
            };

            if self.is_instrumental(&title) {
                tracing::info!("Skipping instrumental song entry: {}", title);
                self.summary.skipped += 1;
                continue;
            }

            let (query, base_name) = match &artist {
                Some(artist) => (
                    format!("{} - {}", artist, title),
                    format!("{} - {}", sanitize_filename(artist), sanitize_filename(&title)),
                ),
                None => (title.clone(), sanitize_filename(&title)),
            };
            let output_base = unique_file_base(&base_dir.join(base_name), DOWNLOAD_EXTENSIONS);

            tracing::info!("Downloading song: {}", title);
            if let Some(path) = self.download_track(&query, &output_base).await
                && let Some(artist) = artist
            {
                downloaded.push((artist, path));
            }
        }

        self.group_by_artist(&base_dir, downloaded);
    }

    /// Move songs of artists with two or more downloads into an artist folder.
    fn group_by_artist(&mut self, base_dir: &Path, downloaded: Vec<(String, PathBuf)>) {
        let mut by_artist: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        for (artist, path) in downloaded {
            by_artist.entry(artist).or_default().push(path);
        }

        for (artist, files) in by_artist {
            if files.len() < 2 {
                continue;
            }
            let folder = base_dir.join(sanitize_filename(&artist));
            if !create_folder(&folder) {
                continue;
            }

            for file in files {
                if !file.exists() {
                    continue;
                }
                let Some(file_name) = file.file_name() else {
                    continue;
                };
                let destination = folder.join(file_name);
                if destination == file {
                    continue;
                }
                let destination = unique_file(&destination);
                match std::fs::rename(&file, &destination) {
                    Ok(()) => {
                        tracing::debug!("Moved {} to {}", file.display(), destination.display());
                        self.session.relocate(&file, &destination);
                    }
                    Err(e) => tracing::warn!("Failed to move {}: {}", file.display(), e),
                }
            }

            self.copy_placeholder(&folder);
        }
    }

    fn copy_placeholder(&self, folder: &Path) {
        let Some(placeholder) = &self.settings.placeholder_image else {
            return;
        };
        if !placeholder.is_file() {
            tracing::warn!("Placeholder image not found: {}", placeholder.display());
            return;
        }
        let Some(file_name) = placeholder.file_name() else {
            return;
        };
        let destination = folder.join(file_name);
        if destination.exists() {
            return;
        }
        if let Err(e) = std::fs::copy(placeholder, &destination) {
            tracing::warn!("Failed to copy placeholder image: {}", e);
        }
    }
}
