use std::path::{Path, PathBuf};

use crate::hash_cache::HASH_CACHE_FILENAME;

/// Extensions the downloader can produce. They form a single slot when
/// allocating output names.
pub const DOWNLOAD_EXTENSIONS: &[&str] = &["mp3", "m4a", "webm", "opus"];

/// Extensions treated as audio when curating an existing library.
pub const LIBRARY_EXTENSIONS: &[&str] = &["mp3", "m4a", "webm", "opus", "aac", "flac", "wav"];

/// Case-insensitive extension check
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

/// All files below `base_dir` with one of `extensions`, in walk order.
/// The hash cache file itself is never included.
pub fn collect_audio_files(base_dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    walkdir::WalkDir::new(base_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry under {}: {}", base_dir.display(), e);
                None
            }
        })
        .filter(|e| {
            e.file_type().is_file()
                && e.file_name() != HASH_CACHE_FILENAME
                && has_extension(e.path(), extensions)
        })
        .map(|e| e.into_path())
        .collect()
}

/// The file the downloader produced for an output base, if any.
pub fn find_downloaded_file(output_base: &Path) -> Option<PathBuf> {
    DOWNLOAD_EXTENSIONS.iter().find_map(|extension| {
        let mut name = output_base.as_os_str().to_owned();
        name.push(".");
        name.push(extension);
        let candidate = PathBuf::from(name);
        candidate.is_file().then_some(candidate)
    })
}
