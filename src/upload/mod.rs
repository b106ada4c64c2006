//! Upload deduplication engine.
//!
//! One [`UploadRun`] is built per invocation and owns everything the run
//! mutates: the session credentials, the hash cache and the hasher. Nothing
//! is shared between runs except the cache file on disk.
//!
//! # Pipeline
//!
//! 1. **Scan**: fetch the account's supported file types and walk the
//!    directory ([`UploadRun::scan`]).
//! 2. **Reconcile**: fetch the remote catalog, resolve each candidate's
//!    digest (cache or hash) and classify it ([`reconciler`]).
//! 3. **Dispatch**: upload the remaining files with bounded parallelism
//!    ([`dispatcher`]).
//! 4. **Persist**: flush the hash cache and tally a [`RunSummary`].
//!
//! # Example
//!
//! ```no_run
//! use ibroadcast_uploader::cache::HashCache;
//! use ibroadcast_uploader::remote::{MockRemote, RemoteService};
//! use ibroadcast_uploader::upload::{RunOptions, UploadRun};
//!
//! let remote = MockRemote::new();
//! let session = remote.login("token").unwrap();
//! let options = RunOptions::new("/home/user/Music").with_parallel_uploads(4);
//!
//! let mut run = UploadRun::new(&remote, session, HashCache::in_memory(), options);
//! let summary = run.execute().unwrap();
//! println!("{}", summary);
//! ```

pub mod dispatcher;
pub mod reconciler;
pub mod summary;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;

use crate::cache::HashCache;
use crate::error::RunError;
use crate::progress::ProgressCallback;
use crate::remote::{RemoteService, Session};
use crate::scanner::{FileEntry, Hasher, ScanError, Walker, WalkerConfig};

pub use dispatcher::Dispatcher;
pub use reconciler::{Classification, Reconciler, Reconciliation};
pub use summary::{FileOutcome, RunSummary, UploadOutcome};

/// Default number of parallel uploads.
pub const DEFAULT_PARALLEL_UPLOADS: usize = 3;

/// Largest accepted number of parallel uploads.
pub const MAX_PARALLEL_UPLOADS: usize = 6;

/// Parameters of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Directory to upload from
    pub directory: PathBuf,
    /// Uploads in flight at once (1..=6)
    pub parallel_uploads: usize,
    /// Upload files even when the catalog already has their digest
    pub force_reupload: bool,
    /// Hash every file even when the cache has a digest for it
    pub force_rehash: bool,
    /// Follow symbolic links while scanning
    pub follow_symlinks: bool,
    /// Drop cache entries for files that no longer exist before flushing
    pub prune_cache: bool,
    /// Tag applied to uploaded tracks
    pub tag: Option<String>,
    /// Playlist uploaded tracks are added to
    pub playlist: Option<String>,
}

impl RunOptions {
    /// Options with defaults for the given directory.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            parallel_uploads: DEFAULT_PARALLEL_UPLOADS,
            force_reupload: false,
            force_rehash: false,
            follow_symlinks: false,
            prune_cache: false,
            tag: None,
            playlist: None,
        }
    }

    /// Set the number of parallel uploads, clamped to 1..=6.
    #[must_use]
    pub fn with_parallel_uploads(mut self, parallel: usize) -> Self {
        self.parallel_uploads = parallel.clamp(1, MAX_PARALLEL_UPLOADS);
        self
    }

    /// Upload files even if already present remotely.
    #[must_use]
    pub fn with_force_reupload(mut self, force: bool) -> Self {
        self.force_reupload = force;
        self
    }

    /// Ignore cached digests.
    #[must_use]
    pub fn with_force_rehash(mut self, force: bool) -> Self {
        self.force_rehash = force;
        self
    }

    /// Follow symbolic links while scanning.
    #[must_use]
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Prune cache entries for vanished files.
    #[must_use]
    pub fn with_prune_cache(mut self, prune: bool) -> Self {
        self.prune_cache = prune;
        self
    }

    /// Set the tag applied to uploads.
    #[must_use]
    pub fn with_tag(mut self, tag: Option<String>) -> Self {
        self.tag = tag;
        self
    }

    /// Set the playlist uploads are added to.
    #[must_use]
    pub fn with_playlist(mut self, playlist: Option<String>) -> Self {
        self.playlist = playlist;
        self
    }
}

/// Context for one upload run.
pub struct UploadRun<'a> {
    remote: &'a dyn RemoteService,
    session: Session,
    cache: HashCache,
    hasher: Hasher,
    options: RunOptions,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl<'a> UploadRun<'a> {
    /// Create a run for an authenticated session.
    #[must_use]
    pub fn new(
        remote: &'a dyn RemoteService,
        session: Session,
        cache: HashCache,
        options: RunOptions,
    ) -> Self {
        Self {
            remote,
            session,
            cache,
            hasher: Hasher::new(),
            options,
            progress_callback: None,
            shutdown_flag: None,
        }
    }

    /// Report hashing and upload progress.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Stop scanning and hashing when this flag is set.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Run options.
    #[must_use]
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// The run's hash cache.
    #[must_use]
    pub fn cache(&self) -> &HashCache {
        &self.cache
    }

    /// Consume the run, returning its hash cache.
    #[must_use]
    pub fn into_cache(self) -> HashCache {
        self.cache
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Find candidate files: the supported, non-hidden files under the
    /// directory, sorted by path.
    ///
    /// # Errors
    ///
    /// - [`RunError::DirectoryInaccessible`] if the directory cannot be scanned
    /// - [`RunError::SupportedTypes`] if the type list cannot be fetched
    /// - [`RunError::Interrupted`] if shutdown was requested during the walk
    pub fn scan(&self) -> Result<Vec<FileEntry>, RunError> {
        let directory = resolve_directory(&self.options.directory)?;

        let extensions = self
            .remote
            .supported_extensions(&self.session)
            .map_err(RunError::SupportedTypes)?;
        log::debug!("Supported extensions: {}", extensions.join(", "));

        let config =
            WalkerConfig::with_extensions(&extensions).follow_symlinks(self.options.follow_symlinks);
        let mut walker = Walker::new(&directory, config);
        if let Some(ref flag) = self.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }

        let (files, errors) = walker.collect_sorted();
        if self.is_shutdown_requested() {
            return Err(RunError::Interrupted);
        }
        if !errors.is_empty() {
            log::warn!("{} entries could not be read while scanning", errors.len());
        }

        log::info!("Found {} files in {}", files.len(), directory.display());
        Ok(files)
    }

    /// Reconcile and upload the given candidates.
    ///
    /// The hash cache is flushed before returning, including when the run
    /// is interrupted during hashing.
    ///
    /// # Errors
    ///
    /// - [`RunError::Catalog`] if the remote catalog cannot be fetched
    /// - [`RunError::Interrupted`] if shutdown was requested while hashing
    pub fn process(&mut self, candidates: Vec<FileEntry>) -> Result<RunSummary, RunError> {
        let started_at = Utc::now();
        if candidates.is_empty() {
            log::info!("No files to upload");
            self.persist_cache();
            return Ok(RunSummary::empty(started_at));
        }

        let catalog = self
            .remote
            .remote_catalog(&self.session)
            .map_err(RunError::Catalog)?;
        log::debug!("Remote catalog holds {} digests", catalog.len());

        let mut reconciler = Reconciler::new(&mut self.cache, &self.hasher, &catalog)
            .with_force_rehash(self.options.force_rehash)
            .with_force_reupload(self.options.force_reupload);
        if let Some(ref flag) = self.shutdown_flag {
            reconciler = reconciler.with_shutdown_flag(Arc::clone(flag));
        }
        if let Some(ref callback) = self.progress_callback {
            reconciler = reconciler.with_progress_callback(Arc::clone(callback));
        }

        let reconciliation = match reconciler.reconcile(candidates) {
            Ok(r) => r,
            Err(e) => {
                self.persist_cache();
                return Err(e);
            }
        };

        let mut dispatcher =
            Dispatcher::new(self.remote, &self.session, self.options.parallel_uploads)
                .with_metadata(self.options.tag.clone(), self.options.playlist.clone());
        if let Some(ref callback) = self.progress_callback {
            dispatcher = dispatcher.with_progress_callback(Arc::clone(callback));
        }
        let uploads = dispatcher.dispatch(reconciliation.to_upload);

        self.persist_cache();

        let skipped = reconciliation
            .skipped
            .into_iter()
            .map(|p| FileOutcome::new(p, UploadOutcome::Skipped));
        let hash_failures = reconciliation
            .hash_failures
            .into_iter()
            .map(|p| FileOutcome::new(p, UploadOutcome::Failed));

        let mut summary =
            RunSummary::from_outcomes(skipped.chain(hash_failures).chain(uploads), started_at);
        summary.files_hashed = self.hasher.hash_count();
        summary.cache_hits = reconciliation.cache_hits;
        debug_assert!(summary.is_consistent());

        log::info!("{}", summary);
        Ok(summary)
    }

    /// Scan, reconcile and upload.
    ///
    /// # Errors
    ///
    /// Any fatal [`RunError`]; per-file failures are reported in the summary.
    pub fn execute(&mut self) -> Result<RunSummary, RunError> {
        let candidates = self.scan()?;
        self.process(candidates)
    }

    fn persist_cache(&mut self) {
        if self.options.prune_cache {
            self.cache.prune_missing();
        }
        if let Err(e) = self.cache.flush() {
            log::warn!("{}", e);
        }
    }
}

/// Run the whole pipeline once for an authenticated session.
///
/// Returns the run summary and the updated cache.
///
/// # Errors
///
/// Any fatal [`RunError`].
pub fn run(
    remote: &dyn RemoteService,
    session: Session,
    cache: HashCache,
    options: RunOptions,
) -> Result<(RunSummary, HashCache), RunError> {
    let mut upload_run = UploadRun::new(remote, session, cache, options);
    let summary = upload_run.execute()?;
    Ok((summary, upload_run.into_cache()))
}

/// Check the directory and make it absolute, so cache keys are stable.
fn resolve_directory(directory: &Path) -> Result<PathBuf, RunError> {
    let inaccessible = |source| RunError::DirectoryInaccessible {
        path: directory.to_path_buf(),
        source,
    };

    Walker::new(directory, WalkerConfig::default())
        .validate_root()
        .map_err(inaccessible)?;

    std::fs::canonicalize(directory).map_err(|e| {
        inaccessible(ScanError::Io {
            path: directory.to_path_buf(),
            source: e,
        })
    })
}
