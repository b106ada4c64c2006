//! JSON-file backed hash cache.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use tempfile::NamedTempFile;

use crate::scanner::Digest;

/// File name of the cache inside the user's home directory.
pub const CACHE_FILE_NAME: &str = ".ibroadcast_md5s";

/// Errors raised while persisting the cache.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    /// Failed to create or write the cache file.
    #[error("Failed to write hash cache {path}: {source}")]
    Io {
        /// Cache file location
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize the cache contents.
    #[error("Failed to serialize hash cache: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Default cache location: `~/.ibroadcast_md5s`.
#[must_use]
pub fn default_cache_path() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.home_dir().join(CACHE_FILE_NAME))
}

/// Persistent mapping from local file path to content digest.
#[derive(Debug, Clone, Default)]
pub struct HashCache {
    /// Where the cache is persisted; `None` keeps it in memory only.
    path: Option<PathBuf>,
    entries: BTreeMap<String, Digest>,
}

impl HashCache {
    /// Create a cache that is never written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the cache from `path`.
    ///
    /// Never fails: a missing, unreadable or corrupt file yields an empty
    /// cache that will overwrite the file on the next [`HashCache::flush`].
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let entries = match fs::read_to_string(path) {
            Ok(content) => parse_entries(path, &content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No hash cache at {}, starting empty", path.display());
                BTreeMap::new()
            }
            Err(e) => {
                log::warn!(
                    "Failed to read hash cache {}, starting empty: {}",
                    path.display(),
                    e
                );
                BTreeMap::new()
            }
        };

        log::debug!("Loaded {} cached digests from {}", entries.len(), path.display());
        Self {
            path: Some(path.to_path_buf()),
            entries,
        }
    }

    /// Location the cache flushes to, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Cached digest for a file, or `None` on a miss.
    ///
    /// Paths that are not valid UTF-8 always miss.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&Digest> {
        self.entries.get(cache_key(path)?)
    }

    /// Insert or replace the digest for a file.
    ///
    /// Paths that are not valid UTF-8 are not stored, so such files are
    /// hashed on every run.
    pub fn put(&mut self, path: &Path, digest: Digest) {
        match cache_key(path) {
            Some(key) => {
                self.entries.insert(key.to_owned(), digest);
            }
            None => log::debug!("Not caching digest for non UTF-8 path {}", path.display()),
        }
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries whose file no longer exists. Returns how many were removed.
    pub fn prune_missing(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|path, _| Path::new(path).exists());
        let removed = before - self.entries.len();
        if removed > 0 {
            log::debug!("Pruned {} cache entries for missing files", removed);
        }
        removed
    }

    /// Persist the full mapping.
    ///
    /// The contents are written to a temporary file next to the target and
    /// renamed over it, so a crash never leaves a half-written cache.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the directory or file cannot be written.
    pub fn flush(&self) -> CacheResult<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        let io_err = |source| CacheError::Io {
            path: path.clone(),
            source,
        };

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(io_err)?;

        let tmp = NamedTempFile::new_in(&parent).map_err(io_err)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, &self.entries)?;
            writer.flush().map_err(io_err)?;
        }
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;

        log::debug!("Wrote {} cached digests to {}", self.entries.len(), path.display());
        Ok(())
    }
}

// A lossy conversion would let distinct names collide on U+FFFD.
fn cache_key(path: &Path) -> Option<&str> {
    path.to_str()
}

fn parse_entries(path: &Path, content: &str) -> BTreeMap<String, Digest> {
    let raw: BTreeMap<String, serde_json::Value> = match serde_json::from_str(content) {
        Ok(raw) => raw,
        Err(e) => {
            log::warn!(
                "Hash cache {} is corrupt, starting empty: {}",
                path.display(),
                e
            );
            return BTreeMap::new();
        }
    };

    raw.into_iter()
        .filter_map(|(file, value)| {
            match value.as_str().map(str::parse::<Digest>) {
                Some(Ok(digest)) => Some((file, digest)),
                _ => {
                    log::debug!("Dropping invalid cache entry for {}", file);
                    None
                }
            }
        })
        .collect()
}
