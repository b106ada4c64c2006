//! Classify candidates as "skip" or "upload".
//!
//! For each candidate, in scan order:
//!
//! 1. Resolve its digest from the [`HashCache`], or hash the file and write
//!    the result back to the cache.
//! 2. Skip it if the digest is already in the [`RemoteCatalog`] (unless
//!    re-upload is forced), otherwise queue it for upload.
//!
//! A file that cannot be hashed is recorded as failed and never queued.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cache::HashCache;
use crate::error::RunError;
use crate::progress::{ProgressCallback, PHASE_HASH};
use crate::remote::RemoteCatalog;
use crate::scanner::{Digest, FileEntry, HashError, Hasher};

/// Decision for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Already stored remotely.
    Skip,
    /// Needs to be transferred.
    Upload,
}

/// Result of reconciling a candidate list.
#[derive(Debug, Default)]
pub struct Reconciliation {
    /// Files to transfer, in scan order
    pub to_upload: Vec<FileEntry>,
    /// Files already stored remotely
    pub skipped: Vec<PathBuf>,
    /// Files that could not be hashed
    pub hash_failures: Vec<PathBuf>,
    /// Digests served from the cache
    pub cache_hits: usize,
}

/// Compares local digests against the remote catalog.
pub struct Reconciler<'a> {
    cache: &'a mut HashCache,
    hasher: &'a Hasher,
    catalog: &'a RemoteCatalog,
    force_rehash: bool,
    force_reupload: bool,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler over a cache, hasher and catalog snapshot.
    #[must_use]
    pub fn new(cache: &'a mut HashCache, hasher: &'a Hasher, catalog: &'a RemoteCatalog) -> Self {
        Self {
            cache,
            hasher,
            catalog,
            force_rehash: false,
            force_reupload: false,
            shutdown_flag: None,
            progress_callback: None,
        }
    }

    /// Ignore cached digests and hash every file.
    #[must_use]
    pub fn with_force_rehash(mut self, force: bool) -> Self {
        self.force_rehash = force;
        self
    }

    /// Queue every file for upload regardless of the catalog.
    #[must_use]
    pub fn with_force_reupload(mut self, force: bool) -> Self {
        self.force_reupload = force;
        self
    }

    /// Set the shutdown flag checked between files.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set a progress callback for the hashing phase.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Digest for a file, from the cache when allowed.
    ///
    /// Returns the digest and whether it came from the cache.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file has to be hashed and cannot be read.
    pub fn resolve_digest(&mut self, file: &FileEntry) -> Result<(Digest, bool), HashError> {
        if !self.force_rehash {
            if let Some(digest) = self.cache.get(&file.path) {
                log::trace!("Cache hit: {}", file.path.display());
                return Ok((digest.clone(), true));
            }
        }

        log::debug!("Calculating MD5 for {}", file.path.display());
        let digest = self.hasher.hash_file(&file.path)?;
        self.cache.put(&file.path, digest.clone());
        Ok((digest, false))
    }

    /// Decide what to do with a file of the given digest.
    #[must_use]
    pub fn classify(&self, digest: &Digest) -> Classification {
        if self.catalog.contains(digest) && !self.force_reupload {
            Classification::Skip
        } else {
            Classification::Upload
        }
    }

    /// Reconcile every candidate.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Interrupted`] if shutdown is requested part-way.
    /// Digests computed before the interruption stay in the cache.
    pub fn reconcile(mut self, candidates: Vec<FileEntry>) -> Result<Reconciliation, RunError> {
        let mut result = Reconciliation::default();

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_start(PHASE_HASH, candidates.len());
        }

        for (idx, file) in candidates.into_iter().enumerate() {
            if self.is_shutdown_requested() {
                log::debug!("Reconciler: Shutdown requested, stopping");
                return Err(RunError::Interrupted);
            }

            if let Some(ref callback) = self.progress_callback {
                callback.on_progress(idx + 1, file.path.to_string_lossy().as_ref());
            }

            match self.resolve_digest(&file) {
                Ok((digest, cached)) => {
                    if cached {
                        result.cache_hits += 1;
                    }
                    match self.classify(&digest) {
                        Classification::Skip => {
                            log::debug!("Skipping {}, already uploaded", file.path.display());
                            result.skipped.push(file.path);
                        }
                        Classification::Upload => {
                            log::trace!("Queued for upload: {}", file.path.display());
                            result.to_upload.push(file);
                        }
                    }
                }
                Err(e) => {
                    log::warn!("Failed to hash {}: {}", file.path.display(), e);
                    result.hash_failures.push(file.path);
                }
            }
        }

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_end(PHASE_HASH);
        }

        log::info!(
            "{} to upload, {} already uploaded, {} unreadable ({} cache hits)",
            result.to_upload.len(),
            result.skipped.len(),
            result.hash_failures.len(),
            result.cache_hits
        );
        Ok(result)
    }
}
