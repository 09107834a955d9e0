//! Persistent `relative path -> (sha256, size, mtime)` store kept inside the
//! library directory.
//!
//! The on-disk format is one record per line, four tab separated fields:
//! `hash`, `relative path`, `size`, `mtime` (seconds since the epoch as a
//! float). There is no header. Full rewrites are sorted by path; single
//! records are appended, so a key may appear more than once in the file until
//! the next rewrite. When loading, the last occurrence wins.

use std::collections::BTreeMap;
use std::fs::{self, Metadata, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Name of the cache file inside the library directory.
pub const HASH_CACHE_FILENAME: &str = ".audio_hashes.txt";

#[derive(Debug, thiserror::Error)]
pub enum HashCacheError {
    #[error("Failed to read hash cache {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to write hash cache {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("Failed to append to hash cache {path}: {source}")]
    Append { path: PathBuf, source: io::Error },

    #[error("Path cannot be stored in the hash cache: {path}")]
    UnrecordablePath { path: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct HashCacheEntry {
    pub hash: String,
    pub size: u64,
    pub mtime: f64,
}

impl HashCacheEntry {
    pub fn from_metadata(hash: String, metadata: &Metadata) -> Self {
        Self {
            hash,
            size: metadata.len(),
            mtime: modification_time(metadata),
        }
    }

    /// A cached hash can be trusted without rehashing only when both the size
    /// and the modification time still match the file.
    pub fn is_fresh(&self, metadata: &Metadata) -> bool {
        self.size == metadata.len() && self.mtime == modification_time(metadata)
    }
}

/// Modification time in fractional seconds since the Unix epoch.
pub fn modification_time(metadata: &Metadata) -> f64 {
    match metadata.modified() {
        Ok(modified) => match modified.duration_since(UNIX_EPOCH) {
            Ok(after) => after.as_secs_f64(),
            Err(before) => -before.duration().as_secs_f64(),
        },
        Err(_) => 0.0,
    }
}

/// Cache key for `path`: its path relative to `base_dir`.
///
/// Returns `None` for paths outside `base_dir` and for paths that would
/// corrupt the line format (non UTF-8, tabs, line breaks).
pub fn relative_key(base_dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base_dir).ok()?.to_str()?;
    if relative.is_empty() || relative.contains(['\t', '\n', '\r']) {
        return None;
    }
    Some(relative.to_string())
}

#[derive(Debug, Clone)]
pub struct HashCache {
    path: PathBuf,
    entries: BTreeMap<String, HashCacheEntry>,
}

impl HashCache {
    /// An empty cache that will persist to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// The cache file for a library directory.
    pub fn path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(HASH_CACHE_FILENAME)
    }

    /// Load the cache at `path`. A missing file is an empty cache; malformed
    /// lines, including lines that are not valid UTF-8, are skipped.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, HashCacheError> {
        let path = path.into();
        let contents = match fs::read(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(source) => return Err(HashCacheError::Read { path, source }),
        };

        let entries = parse(&contents);
        tracing::debug!(
            "Loaded {} hash cache entries from {}",
            entries.len(),
            path.display()
        );
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, relative_path: &str) -> Option<&HashCacheEntry> {
        self.entries.get(relative_path)
    }

    pub fn entries(&self) -> &BTreeMap<String, HashCacheEntry> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Update the in-memory state only.
    pub fn insert(&mut self, relative_path: String, entry: HashCacheEntry) -> Option<HashCacheEntry> {
        self.entries.insert(relative_path, entry)
    }

    pub fn remove(&mut self, relative_path: &str) -> Option<HashCacheEntry> {
        self.entries.remove(relative_path)
    }

    /// Replace the whole in-memory state, e.g. after a full library scan.
    pub fn replace_entries(&mut self, entries: BTreeMap<String, HashCacheEntry>) {
        self.entries = entries;
    }

    /// Insert an entry and persist it by appending a single line.
    pub fn record(&mut self, relative_path: String, entry: HashCacheEntry) -> Result<(), HashCacheError> {
        if relative_path.contains(['\t', '\n', '\r']) {
            return Err(HashCacheError::UnrecordablePath {
                path: relative_path,
            });
        }
        let line = render_line(&relative_path, &entry);
        self.entries.insert(relative_path, entry);
        self.append_line(&line)
    }

    fn append_line(&self, line: &str) -> Result<(), HashCacheError> {
        let append_error = |source| HashCacheError::Append {
            path: self.path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(append_error)?;
        file.write_all(line.as_bytes()).map_err(append_error)
    }

    /// Rewrite the whole file, sorted by relative path.
    pub fn save(&self) -> Result<(), HashCacheError> {
        fs::write(&self.path, render(&self.entries)).map_err(|source| HashCacheError::Write {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(
            "Wrote {} hash cache entries to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Drop entries whose file no longer exists under `base_dir`, returning
    /// the removed keys. Nothing is written.
    pub fn remove_stale(&mut self, base_dir: &Path) -> Vec<String> {
        let stale: Vec<String> = self
            .entries
            .keys()
            .filter(|relative_path| !base_dir.join(relative_path).exists())
            .cloned()
            .collect();
        for relative_path in &stale {
            self.entries.remove(relative_path);
        }
        stale
    }
}

/// Remove cache entries for files that no longer exist under `base_dir`.
///
/// Returns the number of entries removed. The cache file is only rewritten
/// when something was removed and this is not a dry run.
pub fn prune(base_dir: &Path, dry_run: bool) -> Result<usize, HashCacheError> {
    let mut cache = HashCache::load(HashCache::path_in(base_dir))?;
    if cache.is_empty() {
        return Ok(0);
    }

    let removed = cache.remove_stale(base_dir);
    for relative_path in &removed {
        tracing::debug!("Pruning stale hash cache entry: {}", relative_path);
    }

    if removed.is_empty() {
        return Ok(0);
    }
    if dry_run {
        tracing::info!("[DRY-RUN] Would update hash cache: {}", cache.path().display());
    } else {
        cache.save()?;
    }
    Ok(removed.len())
}

fn parse(contents: &[u8]) -> BTreeMap<String, HashCacheEntry> {
    let mut entries = BTreeMap::new();
    for (index, line) in contents.split(|byte| *byte == b'\n').enumerate() {
        let Ok(line) = std::str::from_utf8(line) else {
            tracing::debug!("Skipping hash cache line {}: not valid UTF-8", index + 1);
            continue;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.splitn(4, '\t').collect();
        let [hash, relative_path, size, mtime] = fields.as_slice() else {
            continue;
        };
        let (Ok(size), Ok(mtime)) = (size.parse::<u64>(), mtime.parse::<f64>()) else {
            continue;
        };
        if hash.is_empty() || relative_path.is_empty() || !mtime.is_finite() {
            continue;
        }
        entries.insert(
            relative_path.to_string(),
            HashCacheEntry {
                hash: hash.to_string(),
                size,
                mtime,
            },
        );
    }
    entries
}

fn render_line(relative_path: &str, entry: &HashCacheEntry) -> String {
    format!(
        "{}\t{}\t{}\t{}\n",
        entry.hash, relative_path, entry.size, entry.mtime
    )
}

fn render(entries: &BTreeMap<String, HashCacheEntry>) -> String {
    entries
        .iter()
        .map(|(relative_path, entry)| render_line(relative_path, entry))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(hash: &str, size: u64, mtime: f64) -> HashCacheEntry {
        HashCacheEntry {
            hash: hash.to_string(),
            size,
            mtime,
        }
    }

    #[test]
    fn test_parse_skips_malformed_lines() {
        let contents = "\
aaa\tAlbum/01 - One.mp3\t100\t1700000000.5
not enough fields
bbb\tAlbum/02 - Two.mp3\tbig\t1700000000.5
ccc\tAlbum/03 - Three.mp3\t100\tyesterday

ddd\tSingles/Four.m4a\t42\t1700000001
";
        let entries = parse(contents.as_bytes());
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries.get("Album/01 - One.mp3"),
            Some(&entry("aaa", 100, 1700000000.5))
        );
        assert_eq!(entries.get("Singles/Four.m4a"), Some(&entry("ddd", 42, 1700000001.0)));
    }

    #[test]
    fn test_parse_last_occurrence_wins() {
        let contents = "old\ta.mp3\t1\t1.0\nnew\ta.mp3\t2\t2.0\n";
        let entries = parse(contents.as_bytes());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries.get("a.mp3"), Some(&entry("new", 2, 2.0)));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = HashCache::load(HashCache::path_in(dir.path())).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_load_skips_lines_that_are_not_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = HashCache::path_in(dir.path());
        let mut contents = b"aaa\ta.mp3\t1\t1.0\n".to_vec();
        contents.extend_from_slice(b"bbb\tb\xff\xfe.mp3\t2\t2.0\n");
        contents.extend_from_slice(b"ccc\tc.mp3\t3\t3.0\n");
        fs::write(&path, contents).unwrap();

        let cache = HashCache::load(&path).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a.mp3"), Some(&entry("aaa", 1, 1.0)));
        assert_eq!(cache.get("c.mp3"), Some(&entry("ccc", 3, 3.0)));
    }

    #[test]
    fn test_save_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = HashCache::empty(HashCache::path_in(&dir.path().join("gone")));
        cache.insert("a.mp3".into(), entry("aaa", 1, 1.0));
        assert!(matches!(cache.save(), Err(HashCacheError::Write { .. })));
    }

    #[test]
    fn test_record_into_missing_directory_keeps_entry_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = HashCache::empty(HashCache::path_in(&dir.path().join("gone")));
        let result = cache.record("a.mp3".into(), entry("aaa", 1, 1.0));
        assert!(matches!(result, Err(HashCacheError::Append { .. })));
        assert_eq!(cache.get("a.mp3"), Some(&entry("aaa", 1, 1.0)));
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = HashCache::path_in(dir.path());

        let mut cache = HashCache::empty(&path);
        cache.insert("b/Two.mp3".into(), entry("bbb", 2, 1712345678.123456));
        cache.insert("a/One.mp3".into(), entry("aaa", 1, 1.5));
        cache.insert("c.opus".into(), entry("ccc", 3, 1700000000.0));
        cache.save().unwrap();

        let written = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines[0], "aaa\ta/One.mp3\t1\t1.5");
        assert_eq!(lines[1], "bbb\tb/Two.mp3\t2\t1712345678.123456");
        assert_eq!(lines[2], "ccc\tc.opus\t3\t1700000000");
        assert!(written.ends_with('\n'));

        let loaded = HashCache::load(&path).unwrap();
        assert_eq!(loaded.entries(), cache.entries());

        loaded.save().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), written);
    }

    #[test]
    fn test_record_appends_without_rewriting() {
        let dir = tempfile::tempdir().unwrap();
        let path = HashCache::path_in(dir.path());
        fs::write(&path, "zzz\tz.mp3\t9\t9.0\n").unwrap();

        let mut cache = HashCache::load(&path).unwrap();
        cache.record("a.mp3".into(), entry("aaa", 1, 1.0)).unwrap();
        cache.record("z.mp3".into(), entry("yyy", 10, 10.0)).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "zzz\tz.mp3\t9\t9.0\naaa\ta.mp3\t1\t1\nyyy\tz.mp3\t10\t10\n"
        );

        let loaded = HashCache::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get("z.mp3"), Some(&entry("yyy", 10, 10.0)));
    }

    #[test]
    fn test_record_rejects_unrecordable_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = HashCache::empty(HashCache::path_in(dir.path()));
        let result = cache.record("bad\tname.mp3".into(), entry("aaa", 1, 1.0));
        assert!(matches!(result, Err(HashCacheError::UnrecordablePath { .. })));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_relative_key() {
        let base = Path::new("/music");
        assert_eq!(
            relative_key(base, Path::new("/music/Album/01 - One.mp3")),
            Some(format!("Album{}01 - One.mp3", std::path::MAIN_SEPARATOR))
        );
        assert_eq!(relative_key(base, Path::new("/elsewhere/a.mp3")), None);
        assert_eq!(relative_key(base, Path::new("/music/tab\there.mp3")), None);
        assert_eq!(relative_key(base, Path::new("/music")), None);
    }

    #[test]
    fn test_freshness() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.mp3");
        fs::write(&path, b"first").unwrap();
        let metadata = fs::metadata(&path).unwrap();

        let cached = HashCacheEntry::from_metadata("aaa".into(), &metadata);
        assert!(cached.is_fresh(&metadata));

        let resized = HashCacheEntry {
            size: cached.size + 1,
            ..cached.clone()
        };
        assert!(!resized.is_fresh(&metadata));

        let touched = HashCacheEntry {
            mtime: cached.mtime - 10.0,
            ..cached
        };
        assert!(!touched.is_fresh(&metadata));
    }

    #[test]
    fn test_prune_removes_only_stale_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Album")).unwrap();
        fs::write(dir.path().join("Album").join("kept.mp3"), b"kept").unwrap();
        fs::write(dir.path().join("single.mp3"), b"single").unwrap();

        let kept_key = format!("Album{}kept.mp3", std::path::MAIN_SEPARATOR);
        let mut cache = HashCache::empty(HashCache::path_in(dir.path()));
        cache.insert(kept_key.clone(), entry("aaa", 4, 1.0));
        cache.insert("single.mp3".into(), entry("bbb", 6, 2.0));
        cache.insert("gone.mp3".into(), entry("ccc", 7, 3.0));
        cache.save().unwrap();

        assert_eq!(prune(dir.path(), false).unwrap(), 1);

        let loaded = HashCache::load(HashCache::path_in(dir.path())).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(&kept_key), Some(&entry("aaa", 4, 1.0)));
        assert_eq!(loaded.get("single.mp3"), Some(&entry("bbb", 6, 2.0)));
        assert!(loaded.get("gone.mp3").is_none());
    }

    #[test]
    fn test_prune_clean_cache_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.mp3"), b"b").unwrap();
        fs::write(dir.path().join("a.mp3"), b"a").unwrap();

        // Unsorted with a blank line: any rewrite would normalize this.
        let original = "bbb\tb.mp3\t1\t1.0\n\naaa\ta.mp3\t1\t1.0\n";
        let path = HashCache::path_in(dir.path());
        fs::write(&path, original).unwrap();

        assert_eq!(prune(dir.path(), false).unwrap(), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn test_prune_dry_run_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let original = "aaa\tgone.mp3\t1\t1.0\n";
        let path = HashCache::path_in(dir.path());
        fs::write(&path, original).unwrap();

        assert_eq!(prune(dir.path(), true).unwrap(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn test_prune_without_cache_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(prune(dir.path(), false).unwrap(), 0);
        assert!(!HashCache::path_in(dir.path()).exists());
    }
}
