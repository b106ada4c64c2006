//! Bounded-concurrency upload execution.
//!
//! Transfers run on a dedicated rayon pool with exactly `concurrency`
//! threads. Each transfer blocks its worker until the service answers, so
//! no more than `concurrency` uploads are ever in flight. A failed transfer
//! is recorded and the remaining files continue.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use super::summary::{FileOutcome, UploadOutcome};
use crate::progress::{ProgressCallback, PHASE_UPLOAD};
use crate::remote::{RemoteService, Session, UploadRequest};
use crate::scanner::FileEntry;

/// Runs uploads through a fixed-size worker pool.
pub struct Dispatcher<'a> {
    remote: &'a dyn RemoteService,
    session: &'a Session,
    concurrency: usize,
    tag: Option<String>,
    playlist: Option<String>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl<'a> Dispatcher<'a> {
    /// Create a dispatcher. A concurrency of zero is treated as one.
    #[must_use]
    pub fn new(remote: &'a dyn RemoteService, session: &'a Session, concurrency: usize) -> Self {
        Self {
            remote,
            session,
            concurrency: concurrency.max(1),
            tag: None,
            playlist: None,
            progress_callback: None,
        }
    }

    /// Tag and playlist passed through with every upload.
    #[must_use]
    pub fn with_metadata(mut self, tag: Option<String>, playlist: Option<String>) -> Self {
        self.tag = tag;
        self.playlist = playlist;
        self
    }

    /// Set a progress callback for the upload phase.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Upload every file and return one outcome per file.
    ///
    /// Outcomes are either [`UploadOutcome::Uploaded`] or
    /// [`UploadOutcome::Failed`]; their order is unspecified.
    #[must_use]
    pub fn dispatch(&self, files: Vec<FileEntry>) -> Vec<FileOutcome> {
        if files.is_empty() {
            log::debug!("Dispatcher: nothing to upload");
            return Vec::new();
        }

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_start(PHASE_UPLOAD, files.len());
        }
        log::info!(
            "Uploading {} files with {} parallel uploads",
            files.len(),
            self.concurrency
        );

        let completed = AtomicUsize::new(0);
        let upload_one = |file: FileEntry| {
            let outcome = self.upload_file(file);
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(ref callback) = self.progress_callback {
                callback.on_progress(done, outcome.path.to_string_lossy().as_ref());
            }
            outcome
        };

        let outcomes: Vec<FileOutcome> = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.concurrency)
            .thread_name(|i| format!("upload-{}", i))
            .build()
        {
            Ok(pool) => pool.install(|| files.into_par_iter().map(upload_one).collect()),
            Err(e) => {
                log::warn!("Failed to create upload pool, uploading sequentially: {}", e);
                files.into_iter().map(upload_one).collect()
            }
        };

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_end(PHASE_UPLOAD);
        }
        outcomes
    }

    fn upload_file(&self, file: FileEntry) -> FileOutcome {
        log::info!("Uploading: {}", file.path.display());
        let request = UploadRequest {
            path: file.path,
            tag: self.tag.clone(),
            playlist: self.playlist.clone(),
        };

        match self.remote.upload(self.session, &request) {
            Ok(()) => {
                log::debug!("Uploaded {}", request.path.display());
                FileOutcome::new(request.path, UploadOutcome::Uploaded)
            }
            Err(e) => {
                log::warn!("Upload failed for {}: {}", request.path.display(), e);
                FileOutcome::new(request.path, UploadOutcome::Failed)
            }
        }
    }
}
