//! Session client for the iBroadcast service.
//!
//! The rest of the crate talks to the service only through the
//! [`RemoteService`] trait:
//!
//! - [`http::HttpRemote`]: the real JSON/multipart client (reqwest)
//! - [`mock::MockRemote`]: an in-memory service for tests
//!
//! Every call takes an explicit [`Session`]; nothing about the logged in
//! account is kept in global state.

pub mod http;
pub mod mock;

use std::collections::HashSet;
use std::path::PathBuf;

use serde::Deserialize;

use crate::scanner::Digest;

pub use http::{HttpRemote, HttpRemoteConfig};
pub use mock::MockRemote;

/// Client version reported to the service.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Client name reported to the service and used as the upload `method`.
pub const CLIENT_NAME: &str = "ibroadcast-uploader (rust)";

/// Application id registered for simple uploaders.
pub const APP_ID: u32 = 1007;

/// `User-Agent` header sent with every request.
#[must_use]
pub fn user_agent() -> String {
    format!("ibroadcast-uploader/{}", CLIENT_VERSION)
}

/// Authenticated account credentials for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Account id
    pub user_id: String,
    /// Session token
    pub token: String,
}

impl Session {
    /// Create a session from known credentials.
    #[must_use]
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
        }
    }
}

/// Snapshot of digests the account already stores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteCatalog {
    digests: HashSet<Digest>,
}

impl RemoteCatalog {
    /// Build a catalog from known digests.
    pub fn new(digests: impl IntoIterator<Item = Digest>) -> Self {
        Self {
            digests: digests.into_iter().collect(),
        }
    }

    /// Whether the account already stores content with this digest.
    #[must_use]
    pub fn contains(&self, digest: &Digest) -> bool {
        self.digests.contains(digest)
    }

    /// Number of known digests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.digests.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}

/// One file transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Local file to send
    pub path: PathBuf,
    /// Tag to apply to the uploaded track
    pub tag: Option<String>,
    /// Playlist to add the uploaded track to
    pub playlist: Option<String>,
}

/// Errors raised by remote calls.
#[derive(thiserror::Error, Debug)]
pub enum RemoteError {
    /// Network or protocol failure (connection, TLS, timeout, bad JSON).
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success HTTP status.
    #[error("Server returned bad status: {0}")]
    Status(u16),

    /// The service refused the request (bad token, unknown account).
    #[error("{0}")]
    Rejected(String),

    /// The upload response did not acknowledge the file.
    #[error("File upload failed: {0}")]
    NotAcknowledged(PathBuf),

    /// The file to upload could not be read, or the stream broke mid-transfer.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// File being uploaded
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Operations the uploader needs from the service.
///
/// Implementations must be shareable between upload workers.
pub trait RemoteService: Send + Sync {
    /// Exchange a login token for a session.
    ///
    /// # Errors
    ///
    /// [`RemoteError::Rejected`] when the token is not accepted.
    fn login(&self, login_token: &str) -> Result<Session, RemoteError>;

    /// File extensions the account accepts (e.g. `.mp3`).
    ///
    /// # Errors
    ///
    /// Any [`RemoteError`]; the caller treats this as fatal.
    fn supported_extensions(&self, session: &Session) -> Result<Vec<String>, RemoteError>;

    /// Digests of everything the account already stores.
    ///
    /// # Errors
    ///
    /// Any [`RemoteError`]; the caller treats this as fatal.
    fn remote_catalog(&self, session: &Session) -> Result<RemoteCatalog, RemoteError>;

    /// Send one file and wait for acknowledgement.
    ///
    /// # Errors
    ///
    /// Any [`RemoteError`]; the caller records the file as failed.
    fn upload(&self, session: &Session, request: &UploadRequest) -> Result<(), RemoteError>;
}

/// `md5` field of the catalog response.
///
/// The service has returned both a plain list and an object keyed by digest.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum CatalogDigests {
    List(Vec<String>),
    Map(serde_json::Map<String, serde_json::Value>),
}

impl Default for CatalogDigests {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl CatalogDigests {
    pub(crate) fn into_catalog(self) -> RemoteCatalog {
        let raw: Vec<String> = match self {
            Self::List(list) => list,
            Self::Map(map) => map.into_iter().map(|(k, _)| k).collect(),
        };
        let total = raw.len();
        let catalog = RemoteCatalog::new(raw.iter().filter_map(|s| s.parse().ok()));
        if catalog.len() < total {
            log::debug!(
                "Ignored {} malformed digests in remote catalog",
                total - catalog.len()
            );
        }
        catalog
    }
}
