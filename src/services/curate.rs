use std::fmt;
use std::path::{Path, PathBuf};

use color_eyre::Result;
use color_eyre::eyre::eyre;

use crate::audio_files::{LIBRARY_EXTENSIONS, collect_audio_files, has_extension};
use crate::hash_cache;
use crate::name_matcher::NameMatcher;
use crate::ports::tags::TagReader;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "gif"];
const IGNORED_FILES: &[&str] = &["thumbs.db", "desktop.ini", ".ds_store"];
const ALBUM_ART_STEM: &str = "album_art";
const COVER_FILENAME: &str = "cover.jpg";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurateSummary {
    pub base_dir: PathBuf,
    pub removed_files: usize,
    /// Removed files per target, in configured order
    pub per_artist: Vec<(String, usize)>,
    pub renamed_images: usize,
    pub skipped_images: usize,
    pub removed_folders: usize,
    pub removed_hash_entries: usize,
    pub dry_run: bool,
}

impl fmt::Display for CurateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Base folder: {}", self.base_dir.display())?;
        writeln!(f, "Audio files removed: {}", self.removed_files)?;
        for (artist, count) in &self.per_artist {
            writeln!(f, "- {}: {}", artist, count)?;
        }
        writeln!(f, "Album art renamed: {}", self.renamed_images)?;
        if self.skipped_images > 0 {
            writeln!(f, "Album art skipped (cover exists): {}", self.skipped_images)?;
        }
        writeln!(f, "Folders removed (empty or cover-only): {}", self.removed_folders)?;
        write!(f, "Hash cache entries removed: {}", self.removed_hash_entries)?;
        if self.dry_run {
            write!(f, "\nDry run complete. No files were deleted.")?;
        }
        Ok(())
    }
}

/// Removes files credited to target artists from a library and tidies up
/// what is left behind.
pub struct Curator<T> {
    tags: T,
    matcher: NameMatcher,
    dry_run: bool,
}

impl<T: TagReader> Curator<T> {
    pub fn new(tags: T, matcher: NameMatcher, dry_run: bool) -> Self {
        Self {
            tags,
            matcher,
            dry_run,
        }
    }

    pub fn run(&self, base_dir: &Path) -> Result<CurateSummary> {
        if !base_dir.is_dir() {
            return Err(eyre!("Base folder not found: {}", base_dir.display()));
        }
        if self.matcher.is_empty() {
            tracing::warn!("No target artists configured, only tidying up {}", base_dir.display());
        }

        let mut summary = CurateSummary {
            base_dir: base_dir.to_path_buf(),
            per_artist: self
                .matcher
                .targets()
                .iter()
                .map(|target| (target.name.clone(), 0))
                .collect(),
            dry_run: self.dry_run,
            ..Default::default()
        };

        let (renamed, skipped) = self.rename_album_art(base_dir);
        summary.renamed_images = renamed;
        summary.skipped_images = skipped;

        for path in collect_audio_files(base_dir, LIBRARY_EXTENSIONS) {
            let Some(artist) = self.matching_artist(base_dir, &path) else {
                continue;
            };
            if self.dry_run {
                tracing::info!("[DRY-RUN] Remove file: {} (matched {})", path.display(), artist);
            } else if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!("Failed to remove {}: {}", path.display(), e);
                continue;
            } else {
                tracing::info!("Removed: {} (matched {})", path.display(), artist);
            }

            summary.removed_files += 1;
            if let Some((_, count)) = summary
                .per_artist
                .iter_mut()
                .find(|(name, _)| name.as_str() == artist)
            {
                *count += 1;
            }
        }

        summary.removed_folders = self.cleanup_folders(base_dir);
        summary.removed_hash_entries = match hash_cache::prune(base_dir, self.dry_run) {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!("Failed to prune hash cache: {:?}", e);
                0
            }
        };

        Ok(summary)
    }

    /// Tag values first, then the file stem and its folders from the base
    /// directory down.
    fn matching_artist(&self, base_dir: &Path, path: &Path) -> Option<&str> {
        let relative = path.strip_prefix(base_dir).unwrap_or(path);
        let stem = relative
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let folders = relative
            .parent()
            .into_iter()
            .flat_map(|parent| parent.iter())
            .map(|part| part.to_string_lossy().into_owned());

        let candidates = self
            .tags
            .artist_tags(path)
            .into_iter()
            .chain(std::iter::once(stem))
            .chain(folders);
        self.matcher.find_match(candidates)
    }

    /// Rename `album_art.<ext>` images to `cover.<ext>`. Returns the renamed
    /// and skipped counts.
    fn rename_album_art(&self, base_dir: &Path) -> (usize, usize) {
        let images: Vec<PathBuf> = walkdir::WalkDir::new(base_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| is_album_art(path))
            .collect();

        let mut renamed = 0;
        let mut skipped = 0;
        for source in images {
            let target = match source.extension() {
                Some(extension) => {
                    let mut name = std::ffi::OsString::from("cover.");
                    name.push(extension);
                    source.with_file_name(name)
                }
                None => source.with_file_name("cover"),
            };
            if target.exists() {
                tracing::info!(
                    "Skip rename (target exists): {} -> {}",
                    source.display(),
                    target.display()
                );
                skipped += 1;
                continue;
            }

            if self.dry_run {
                tracing::info!("[DRY-RUN] Rename: {} -> {}", source.display(), target.display());
            } else if let Err(e) = std::fs::rename(&source, &target) {
                tracing::warn!("Failed to rename {}: {}", source.display(), e);
                continue;
            } else {
                tracing::info!("Renamed: {} -> {}", source.display(), target.display());
            }
            renamed += 1;
        }
        (renamed, skipped)
    }

    /// Remove folders holding nothing but a cover image, bottom-up. The base
    /// directory itself is never removed.
    fn cleanup_folders(&self, base_dir: &Path) -> usize {
        let folders: Vec<PathBuf> = walkdir::WalkDir::new(base_dir)
            .min_depth(1)
            .contents_first(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_dir())
            .map(|entry| entry.into_path())
            .collect();

        let mut removed = 0;
        for folder in folders {
            let Some(leftovers) = removable_contents(&folder) else {
                continue;
            };

            if self.dry_run {
                tracing::info!("[DRY-RUN] Remove folder: {}", folder.display());
                removed += 1;
                continue;
            }

            for file in &leftovers {
                if let Err(e) = std::fs::remove_file(file) {
                    tracing::warn!("Failed to remove {}: {}", file.display(), e);
                }
            }
            match std::fs::remove_dir(&folder) {
                Ok(()) => {
                    tracing::debug!("Removed folder: {}", folder.display());
                    removed += 1;
                }
                Err(e) => tracing::warn!("Failed to remove folder {}: {}", folder.display(), e),
            }
        }
        removed
    }
}

fn is_album_art(path: &Path) -> bool {
    let stem_matches = path
        .file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.eq_ignore_ascii_case(ALBUM_ART_STEM));
    stem_matches && (path.extension().is_none() || has_extension(path, IMAGE_EXTENSIONS))
}

/// Files to delete before `folder` can go, or `None` when it still holds a
/// subfolder or anything besides a cover image and system clutter.
fn removable_contents(folder: &Path) -> Option<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", folder.display(), e);
            return None;
        }
    };

    let mut leftovers = Vec::new();
    for entry in entries {
        let entry = entry.ok()?;
        let path = entry.path();
        if path.is_dir() {
            return None;
        }
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if name != COVER_FILENAME && !IGNORED_FILES.contains(&name.as_str()) {
            return None;
        }
        leftovers.push(path);
    }
    Some(leftovers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash_cache::{HashCache, HashCacheEntry};
    use crate::ports::tags::MockTagReader;
    use std::fs;

    fn no_tags() -> MockTagReader {
        let mut tags = MockTagReader::new();
        tags.expect_artist_tags().returning(|_| Vec::new());
        tags
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, path.to_string_lossy().as_bytes()).unwrap();
    }

    #[test]
    fn test_removes_files_matched_by_name_and_folder() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();
        touch(&base.join("Queen - Innuendo.mp3"));
        touch(&base.join("Queen/A Night at the Opera/01 - Death on Two Legs.flac"));
        touch(&base.join("Queen/A Night at the Opera/cover.jpg"));
        touch(&base.join("Muse/Hysteria.mp3"));
        touch(&base.join("notes.txt"));

        let curator = Curator::new(no_tags(), NameMatcher::new(["Queen", "Nobody"]), false);
        let summary = curator.run(base).unwrap();

        assert_eq!(summary.removed_files, 2);
        assert_eq!(
            summary.per_artist,
            [("Queen".to_string(), 2), ("Nobody".to_string(), 0)]
        );
        // Cover-only album folder and then the emptied artist folder go
        assert_eq!(summary.removed_folders, 2);
        assert!(!base.join("Queen").exists());
        assert!(base.join("Muse/Hysteria.mp3").is_file());
        assert!(base.join("notes.txt").is_file());
        assert!(base.is_dir());
    }

    #[test]
    fn test_tags_take_priority_over_path() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();
        let tagged = base.join("Various/Track 01.mp3");
        touch(&tagged);
        touch(&base.join("Various/Track 02.mp3"));

        let mut tags = MockTagReader::new();
        let expected = tagged.clone();
        tags.expect_artist_tags().returning(move |path| {
            if path == expected.as_path() {
                vec!["Someone Else".to_string(), "Daft Punk".to_string()]
            } else {
                vec!["Justice".to_string()]
            }
        });

        let curator = Curator::new(tags, NameMatcher::new(["daft punk"]), false);
        let summary = curator.run(base).unwrap();

        assert_eq!(summary.removed_files, 1);
        assert!(!tagged.exists());
        assert!(base.join("Various/Track 02.mp3").is_file());
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();
        touch(&base.join("Queen/Innuendo.mp3"));
        touch(&base.join("Muse/album_art.PNG"));
        touch(&base.join("Empty/desktop.ini"));

        let curator = Curator::new(no_tags(), NameMatcher::new(["Queen"]), true);
        let summary = curator.run(base).unwrap();

        assert_eq!(summary.removed_files, 1);
        assert_eq!(summary.renamed_images, 1);
        // Queen still holds its song during a dry run
        assert_eq!(summary.removed_folders, 1);
        assert!(base.join("Queen/Innuendo.mp3").is_file());
        assert!(base.join("Muse/album_art.PNG").is_file());
        assert!(base.join("Empty/desktop.ini").is_file());
        assert!(summary.to_string().ends_with("Dry run complete. No files were deleted."));
    }

    #[test]
    fn test_album_art_is_renamed_unless_cover_exists() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();
        touch(&base.join("A/album_art.jpg"));
        touch(&base.join("A/song.mp3"));
        touch(&base.join("B/album_art.png"));
        touch(&base.join("B/cover.png"));
        touch(&base.join("B/song.mp3"));
        touch(&base.join("C/album_art.txt"));

        let curator = Curator::new(no_tags(), NameMatcher::default(), false);
        let summary = curator.run(base).unwrap();

        assert_eq!(summary.renamed_images, 1);
        assert_eq!(summary.skipped_images, 1);
        assert!(base.join("A/cover.jpg").is_file());
        assert!(!base.join("A/album_art.jpg").exists());
        assert!(base.join("B/album_art.png").is_file());
        assert!(base.join("C/album_art.txt").is_file());
    }

    #[test]
    fn test_stale_hash_entries_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();
        touch(&base.join("Queen - Innuendo.mp3"));
        touch(&base.join("Muse - Hysteria.mp3"));

        let mut cache = HashCache::empty(HashCache::path_in(base));
        for (key, hash) in [("Queen - Innuendo.mp3", "aa"), ("Muse - Hysteria.mp3", "bb")] {
            let metadata = fs::metadata(base.join(key)).unwrap();
            cache.insert(key.to_string(), HashCacheEntry::from_metadata(hash.to_string(), &metadata));
        }
        cache.save().unwrap();

        let curator = Curator::new(no_tags(), NameMatcher::new(["Queen"]), false);
        let summary = curator.run(base).unwrap();

        assert_eq!(summary.removed_hash_entries, 1);
        let cache = HashCache::load(HashCache::path_in(base)).unwrap();
        assert!(cache.get("Queen - Innuendo.mp3").is_none());
        assert!(cache.get("Muse - Hysteria.mp3").is_some());
    }

    #[test]
    fn test_missing_base_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let curator = Curator::new(no_tags(), NameMatcher::new(["Queen"]), false);
        assert!(curator.run(&dir.path().join("missing")).is_err());
    }
}
