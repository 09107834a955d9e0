use std::path::Path;

use audiotags::Tag;

use crate::ports::tags::TagReader;

/// Reads artist and album artist tags with `audiotags` (mp3, m4a, flac).
pub struct AudiotagsReader;

impl TagReader for AudiotagsReader {
    fn artist_tags(&self, path: &Path) -> Vec<String> {
        let tag = match Tag::new().read_from_path(path) {
            Ok(tag) => tag,
            Err(e) => {
                tracing::trace!(path = %path.display(), "No readable tags: {}", e);
                return Vec::new();
            }
        };

        let mut values = Vec::new();
        for value in [tag.artist(), tag.album_artist()].into_iter().flatten() {
            let value = value.trim();
            if !value.is_empty() && !values.iter().any(|v: &String| v == value) {
                values.push(value.to_string());
            }
        }
        values
    }
}
