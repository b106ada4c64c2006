//! In-memory remote service for testing.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{RemoteCatalog, RemoteError, RemoteService, Session, UploadRequest};
use crate::scanner::hasher::hash_reader;
use crate::scanner::Digest;

/// How a scripted upload failure presents itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// The connection drops mid-transfer.
    ConnectionReset,
    /// The service answers with this HTTP status.
    Status(u16),
    /// The service answers 200 but `result` is false.
    NotAcknowledged,
}

/// In-memory [`RemoteService`] for tests.
///
/// Stores the account's catalog behind a [`Mutex`], so successful uploads
/// show up in the next catalog fetch just as they would on the real
/// service. Tracks call counts and the peak number of concurrent uploads.
///
/// # Examples
///
/// ```
/// use ibroadcast_uploader::remote::{MockRemote, RemoteService};
///
/// let remote = MockRemote::new().with_extensions([".mp3"]);
/// let session = remote.login("token").unwrap();
/// assert_eq!(remote.supported_extensions(&session).unwrap(), vec![".mp3"]);
/// ```
#[derive(Debug)]
pub struct MockRemote {
    login_token: Option<String>,
    extensions: Vec<String>,
    catalog: Mutex<HashSet<Digest>>,
    catalog_unavailable: bool,
    failures: HashMap<String, MockFailure>,
    upload_delay: Option<Duration>,
    attempts: Mutex<Vec<UploadRequest>>,
    catalog_fetches: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl Default for MockRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRemote {
    /// Accepts any login token, supports `.mp3` and `.flac`, empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self {
            login_token: None,
            extensions: vec![".mp3".to_string(), ".flac".to_string()],
            catalog: Mutex::new(HashSet::new()),
            catalog_unavailable: false,
            failures: HashMap::new(),
            upload_delay: None,
            attempts: Mutex::new(Vec::new()),
            catalog_fetches: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Only accept this login token.
    #[must_use]
    pub fn with_login_token(mut self, token: impl Into<String>) -> Self {
        self.login_token = Some(token.into());
        self
    }

    /// Replace the supported extension list.
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Seed the catalog with digests the account already stores.
    #[must_use]
    pub fn with_catalog(self, digests: impl IntoIterator<Item = Digest>) -> Self {
        self.lock_catalog().extend(digests);
        self
    }

    /// Make every catalog fetch fail with a 503.
    #[must_use]
    pub fn with_catalog_unavailable(mut self) -> Self {
        self.catalog_unavailable = true;
        self
    }

    /// Fail every upload of a file with this name.
    #[must_use]
    pub fn failing_upload(mut self, file_name: impl Into<String>, failure: MockFailure) -> Self {
        self.failures.insert(file_name.into(), failure);
        self
    }

    /// Hold each upload open for `delay` before answering.
    #[must_use]
    pub fn with_upload_delay(mut self, delay: Duration) -> Self {
        self.upload_delay = Some(delay);
        self
    }

    /// Every upload request received, in arrival order.
    #[must_use]
    pub fn upload_attempts(&self) -> Vec<UploadRequest> {
        self.attempts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Paths of every upload request received, sorted.
    #[must_use]
    pub fn attempted_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.upload_attempts().into_iter().map(|r| r.path).collect();
        paths.sort();
        paths
    }

    /// Number of catalog fetches served.
    #[must_use]
    pub fn catalog_fetches(&self) -> usize {
        self.catalog_fetches.load(Ordering::SeqCst)
    }

    /// Highest number of uploads that were in progress at the same time.
    #[must_use]
    pub fn peak_concurrent_uploads(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Whether the account stores content with this digest.
    #[must_use]
    pub fn has_digest(&self, digest: &Digest) -> bool {
        self.lock_catalog().contains(digest)
    }

    fn lock_catalog(&self) -> std::sync::MutexGuard<'_, HashSet<Digest>> {
        self.catalog
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn check_session(&self, session: &Session) -> Result<(), RemoteError> {
        if session.token.is_empty() {
            return Err(RemoteError::Rejected("Invalid session".into()));
        }
        Ok(())
    }

    fn transfer(&self, request: &UploadRequest) -> Result<(), RemoteError> {
        let io_err = |source| RemoteError::Io {
            path: request.path.clone(),
            source,
        };
        let file = File::open(&request.path).map_err(io_err)?;

        if let Some(delay) = self.upload_delay {
            std::thread::sleep(delay);
        }

        let file_name = request
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match self.failures.get(&file_name) {
            Some(MockFailure::ConnectionReset) => Err(io_err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ))),
            Some(MockFailure::Status(code)) => Err(RemoteError::Status(*code)),
            Some(MockFailure::NotAcknowledged) => {
                Err(RemoteError::NotAcknowledged(request.path.clone()))
            }
            None => {
                let digest = hash_reader(file).map_err(io_err)?;
                self.lock_catalog().insert(digest);
                Ok(())
            }
        }
    }
}

impl RemoteService for MockRemote {
    fn login(&self, login_token: &str) -> Result<Session, RemoteError> {
        match self.login_token {
            Some(ref expected) if expected != login_token => {
                Err(RemoteError::Rejected("Login failed".into()))
            }
            _ => Ok(Session::new("1", format!("session-{}", login_token))),
        }
    }

    fn supported_extensions(&self, session: &Session) -> Result<Vec<String>, RemoteError> {
        self.check_session(session)?;
        Ok(self.extensions.clone())
    }

    fn remote_catalog(&self, session: &Session) -> Result<RemoteCatalog, RemoteError> {
        self.check_session(session)?;
        self.catalog_fetches.fetch_add(1, Ordering::SeqCst);
        if self.catalog_unavailable {
            return Err(RemoteError::Status(503));
        }
        Ok(RemoteCatalog::new(self.lock_catalog().iter().cloned()))
    }

    fn upload(&self, session: &Session, request: &UploadRequest) -> Result<(), RemoteError> {
        self.check_session(session)?;
        self.attempts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(request.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let result = self.transfer(request);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
