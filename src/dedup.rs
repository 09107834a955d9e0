//! Content-hash deduplication for the library directory.
//!
//! A [`LibrarySession`] owns everything that is mutated while a run stores
//! files: the [`HashCache`] and the [`DedupIndex`] derived from it. It is
//! seeded by scanning the library once when opened and written back in full
//! by [`LibrarySession::finish`]. All mutation goes through `&mut self`, so
//! the membership check and the insert can't interleave with another writer.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::Result;
use color_eyre::eyre::Context;

use crate::audio_files::{DOWNLOAD_EXTENSIONS, collect_audio_files};
use crate::file_hash::compute_sha256;
use crate::hash_cache::{HashCache, HashCacheEntry, relative_key};

/// Set of content hashes known to be stored in the library.
#[derive(Debug, Clone, Default)]
pub struct DedupIndex {
    hashes: HashSet<String>,
}

impl DedupIndex {
    pub fn contains(&self, digest: &str) -> bool {
        self.hashes.contains(digest)
    }

    /// Returns `true` when `digest` is already known (the new file is a
    /// duplicate). Otherwise remembers it and returns `false`.
    pub fn check_and_register(&mut self, digest: &str) -> bool {
        if self.hashes.contains(digest) {
            return true;
        }
        self.hashes.insert(digest.to_string());
        false
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

impl FromIterator<String> for DedupIndex {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self {
            hashes: iter.into_iter().collect(),
        }
    }
}

/// Counters from the initial library scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub files: usize,
    pub reused: usize,
    pub hashed: usize,
    pub failed: usize,
}

/// Outcome of registering a newly produced file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// The content was new; the file stays and is recorded.
    Stored { path: PathBuf, hash: String },
    /// The content already existed in the library; the file was deleted.
    Duplicate { path: PathBuf, hash: String },
}

#[derive(Debug)]
pub struct LibrarySession {
    base_dir: PathBuf,
    cache: HashCache,
    index: DedupIndex,
}

impl LibrarySession {
    /// Seed a session from the library at `base_dir`.
    ///
    /// Every audio file is stat'ed; files whose cached size and mtime still
    /// match reuse the cached hash, everything else is rehashed. The cache is
    /// then rewritten with exactly the files that were found.
    pub fn open(base_dir: &Path) -> Result<Self> {
        fs::create_dir_all(base_dir)
            .wrap_err_with(|| format!("Failed to create library directory: {}", base_dir.display()))?;

        let cache_path = HashCache::path_in(base_dir);
        let previous = HashCache::load(&cache_path).unwrap_or_else(|e| {
            tracing::warn!("{}; rebuilding from scratch", e);
            HashCache::empty(&cache_path)
        });

        tracing::info!("Indexing audio files in {}", base_dir.display());
        let (entries, summary) = scan(base_dir, &previous);
        let index = entries.values().map(|e| e.hash.clone()).collect::<DedupIndex>();

        let mut cache = previous;
        cache.replace_entries(entries);
        if let Err(e) = cache.save() {
            tracing::warn!("{}", e);
        }

        tracing::info!(
            "Indexed {} audio files ({} from cache, {} hashed, {} unreadable), {} distinct",
            summary.files,
            summary.reused,
            summary.hashed,
            summary.failed,
            index.len()
        );

        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            cache,
            index,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn index(&self) -> &DedupIndex {
        &self.index
    }

    pub fn cache(&self) -> &HashCache {
        &self.cache
    }

    /// Hash a freshly produced file and either keep it or delete it as a
    /// duplicate of content already in the library.
    pub fn register(&mut self, path: &Path) -> Result<Registration> {
        let hash = compute_sha256(path)?;

        if self.index.check_and_register(&hash) {
            tracing::info!("Duplicate audio detected, removing: {}", path.display());
            if let Err(e) = fs::remove_file(path) {
                tracing::warn!("Failed to remove duplicate {}: {}", path.display(), e);
            }
            return Ok(Registration::Duplicate {
                path: path.to_path_buf(),
                hash,
            });
        }

        self.record(path, hash.clone());
        Ok(Registration::Stored {
            path: path.to_path_buf(),
            hash,
        })
    }

    /// Follow a file that was moved inside the library.
    pub fn relocate(&mut self, from: &Path, to: &Path) {
        let Some(old_key) = relative_key(&self.base_dir, from) else {
            return;
        };
        if let Some(entry) = self.cache.remove(&old_key) {
            self.record(to, entry.hash);
        }
    }

    fn record(&mut self, path: &Path, hash: String) {
        let Some(key) = relative_key(&self.base_dir, path) else {
            tracing::debug!("Not caching hash for {}", path.display());
            return;
        };
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!("Failed to stat {} for cache update: {}", path.display(), e);
                return;
            }
        };
        if let Err(e) = self
            .cache
            .record(key, HashCacheEntry::from_metadata(hash, &metadata))
        {
            tracing::warn!("{}", e);
        }
    }

    /// Final full rewrite of the cache, folding in everything appended during
    /// the run.
    pub fn finish(self) -> Result<()> {
        self.cache.save()?;
        Ok(())
    }
}

fn scan(base_dir: &Path, previous: &HashCache) -> (BTreeMap<String, HashCacheEntry>, ScanSummary) {
    let mut entries = BTreeMap::new();
    let mut summary = ScanSummary::default();

    for path in collect_audio_files(base_dir, DOWNLOAD_EXTENSIONS) {
        let Some(key) = relative_key(base_dir, &path) else {
            tracing::debug!("Skipping path that can't be cached: {}", path.display());
            continue;
        };
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::debug!("Failed to stat {}: {}", path.display(), e);
                summary.failed += 1;
                continue;
            }
        };

        let hash = match previous.get(&key) {
            Some(cached) if cached.is_fresh(&metadata) => {
                summary.reused += 1;
                cached.hash.clone()
            }
            _ => match compute_sha256(&path) {
                Ok(hash) => {
                    summary.hashed += 1;
                    hash
                }
                Err(e) => {
                    tracing::debug!("{:#}", e);
                    summary.failed += 1;
                    continue;
                }
            },
        };

        summary.files += 1;
        entries.insert(key, HashCacheEntry::from_metadata(hash, &metadata));
    }

    (entries, summary)
}
