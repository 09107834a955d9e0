use std::path::Path;

/// Port for reading artist-like tag values from an audio file.
///
/// Returns an empty list when the format is unsupported or the file can't be
/// read; tags are a hint, never a requirement.
#[cfg_attr(test, mockall::automock)]
pub trait TagReader {
    fn artist_tags(&self, path: &Path) -> Vec<String>;
}
