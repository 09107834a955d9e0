//! Collision-free file and folder names: `Name`, `Name (2)`, `Name (3)`, ...
//!
//! These only check which names exist. Two callers racing for the same
//! directory can still collide between the check and the write; the pipeline
//! is sequential, so that never happens here.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Sanitize a name for use as a file or folder name (replace characters
/// that are invalid on common filesystems)
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

fn with_suffix(path: &Path, counter: u32) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(" ({counter})"));
    PathBuf::from(name)
}

fn with_extension_appended(base: &Path, extension: &str) -> PathBuf {
    let mut name: OsString = base.as_os_str().to_owned();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// `base_dir/name` if free, otherwise the first free `base_dir/name (N)`
/// with N starting at 2.
pub fn unique_folder(base_dir: &Path, name: &str) -> PathBuf {
    let desired = base_dir.join(name);
    if !desired.exists() {
        return desired;
    }
    (2..)
        .map(|counter| with_suffix(&desired, counter))
        .find(|candidate| !candidate.exists())
        .unwrap_or(desired)
}

/// A base path (no extension) such that none of `base.<ext>` exists for any
/// of `extensions`.
///
/// All extensions share one slot, so a file that will only get its final
/// extension later cannot land next to an existing file of another type.
pub fn unique_file_base(base: &Path, extensions: &[&str]) -> PathBuf {
    let taken = |candidate: &Path| {
        extensions
            .iter()
            .any(|extension| with_extension_appended(candidate, extension).exists())
    };
    if !taken(base) {
        return base.to_path_buf();
    }
    (2..)
        .map(|counter| with_suffix(base, counter))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_path_buf())
}

/// `path` if free, otherwise `stem (N).ext` next to it.
pub fn unique_file(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path.file_stem().map(OsString::from).unwrap_or_default();
    let extension = path.extension();

    (2..)
        .map(|counter| {
            let mut name = stem.clone();
            name.push(format!(" ({counter})"));
            if let Some(extension) = extension {
                name.push(".");
                name.push(extension);
            }
            parent.join(name)
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}
