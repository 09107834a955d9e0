//! Retrieval modes: turn input list entries into catalog lookups, audio
//! downloads and library files.

mod albums;
mod artists;
mod playlists;
mod songs;

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::audio_files::find_downloaded_file;
use crate::config::RetryPolicies;
use crate::dedup::{LibrarySession, Registration};
use crate::input_list::ListMode;
use crate::ports::catalog::{CatalogClient, thumbnail_url};
use crate::ports::fetcher::{AudioFetcher, ImageFetcher};

const COVER_FILENAME: &str = "cover.jpg";
/// Artist name used when the catalog lists no artists.
const UNKNOWN_ARTIST: &str = "Unknown Artist";

pub struct RetrievalSettings {
    /// Lowercase substrings marking instrumental or karaoke titles
    pub instrumental_keywords: Vec<String>,
    /// Copied into artist folders created when grouping songs
    pub placeholder_image: Option<PathBuf>,
    pub retry: RetryPolicies,
}

/// Counters for one retrieval run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Audio downloads started
    pub attempted: usize,
    pub stored: usize,
    pub duplicates: usize,
    /// Lookups or downloads that failed after all retries
    pub failed: usize,
    /// Entries skipped on purpose (instrumental, qualifier mismatch, non-track)
    pub skipped: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} downloads attempted, {} stored, {} duplicates removed, {} failed, {} skipped",
            self.attempted, self.stored, self.duplicates, self.failed, self.skipped
        )
    }
}

pub struct Retriever<'s, C, A, I> {
    catalog: C,
    audio: A,
    images: I,
    session: &'s mut LibrarySession,
    settings: RetrievalSettings,
    summary: RunSummary,
}

impl<'s, C: CatalogClient, A: AudioFetcher, I: ImageFetcher> Retriever<'s, C, A, I> {
    pub fn new(
        catalog: C,
        audio: A,
        images: I,
        session: &'s mut LibrarySession,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            catalog,
            audio,
            images,
            session,
            settings,
            summary: RunSummary::default(),
        }
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Process every entry of an input list in order.
    pub async fn run(&mut self, mode: ListMode, entries: &[String]) -> RunSummary {
        tracing::info!("Processing {} {:?} entries", entries.len(), mode);
        match mode {
            ListMode::Songs => self.retrieve_songs(entries).await,
            ListMode::Albums => self.retrieve_albums(entries).await,
            ListMode::Playlists => self.retrieve_playlists(entries).await,
            ListMode::Artists => self.retrieve_artists(entries).await,
        }
        tracing::info!("Retrieval finished: {}", self.summary);
        self.summary
    }

    fn base_dir(&self) -> PathBuf {
        self.session.base_dir().to_path_buf()
    }

    fn is_instrumental(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.settings
            .instrumental_keywords
            .iter()
            .any(|keyword| !keyword.is_empty() && lower.contains(&keyword.to_lowercase()))
    }

    /// Download one track to `<output_base>.<ext>` and register it with the
    /// library. Returns the stored path, or `None` when the download failed
    /// or turned out to be a duplicate.
    async fn download_track(&mut self, query: &str, output_base: &Path) -> Option<PathBuf> {
        let policy = self.settings.retry.download;
        let audio = &self.audio;
        self.summary.attempted += 1;

        tracing::debug!("Audio search: {}", query);
        let fetched = policy
            .execute(&format!("Audio download for '{}'", query), || {
                audio.fetch(query, output_base)
            })
            .await;
        if fetched.is_none() {
            self.summary.failed += 1;
            return None;
        }

        let Some(downloaded) = find_downloaded_file(output_base) else {
            tracing::warn!("No downloaded file found for '{}'", query);
            self.summary.failed += 1;
            return None;
        };
        tracing::debug!("Downloaded file: {}", downloaded.display());

        match self.session.register(&downloaded) {
            Ok(Registration::Stored { path, .. }) => {
                self.summary.stored += 1;
                Some(path)
            }
            Ok(Registration::Duplicate { .. }) => {
                self.summary.duplicates += 1;
                None
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to hash {}, keeping it unindexed: {:?}",
                    downloaded.display(),
                    e
                );
                self.summary.stored += 1;
                Some(downloaded)
            }
        }
    }

    /// Save the thumbnail sized image as `cover.jpg` in `folder`.
    async fn download_cover(&self, images: &[String], folder: &Path) {
        let Some(url) = thumbnail_url(images) else {
            return;
        };
        let destination = folder.join(COVER_FILENAME);
        let stored = self
            .settings
            .retry
            .image
            .execute(&format!("Image download {}", url), || {
                self.images.fetch_image(url, &destination)
            })
            .await;
        if stored.is_some() {
            tracing::info!("Downloaded cover art for {}", folder.display());
        }
    }
}

/// Create `folder`; failures are logged and reported as `false`.
fn create_folder(folder: &Path) -> bool {
    match std::fs::create_dir_all(folder) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Failed to create {}: {}", folder.display(), e);
            false
        }
    }
}

/// Drop repeated or empty ids, keeping first occurrences in order.
fn dedup_by_id<T>(items: Vec<T>, id: impl Fn(&T) -> &str) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| {
            let key = id(item);
            !key.is_empty() && seen.insert(key.to_string())
        })
        .collect()
}
