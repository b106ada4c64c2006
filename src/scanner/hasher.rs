//! MD5 file hasher with streaming support.
//!
//! # Overview
//! This module provides the [`Hasher`] struct for computing content digests
//! of files using fixed-size block reads, so memory use does not depend on
//! file size. MD5 is used because the remote catalog is keyed by MD5 hex.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use md5::{Digest as _, Md5};
use serde::{Deserialize, Serialize};

use super::HashError;

/// Read block size for streaming hashes (8 KiB).
pub const BLOCK_SIZE: usize = 8 * 1024;

/// Length of a hex-encoded MD5 digest.
const DIGEST_HEX_LEN: usize = 32;

/// A content digest as a 32-character lowercase hex string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest(String);

impl Digest {
    /// The hex representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error returned when a string is not a valid hex digest.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid digest: {0:?}")]
pub struct DigestParseError(pub String);

impl FromStr for Digest {
    type Err = DigestParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.len() == DIGEST_HEX_LEN && trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Self(trimmed.to_ascii_lowercase()))
        } else {
            Err(DigestParseError(s.to_string()))
        }
    }
}

impl TryFrom<String> for Digest {
    type Error = DigestParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.0
    }
}

/// Streaming content hasher.
///
/// Keeps a count of how many files it has hashed, which the upload run
/// reports and tests use to verify that warm caches skip hashing.
#[derive(Debug, Default)]
pub struct Hasher {
    files_hashed: AtomicU64,
}

impl Hasher {
    /// Create a new hasher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files hashed so far.
    #[must_use]
    pub fn hash_count(&self) -> u64 {
        self.files_hashed.load(Ordering::Relaxed)
    }

    /// Compute the digest of a file, reading it in [`BLOCK_SIZE`] chunks.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or a read fails
    /// part-way through (e.g. the file vanished).
    pub fn hash_file(&self, path: &Path) -> Result<Digest, HashError> {
        self.files_hashed.fetch_add(1, Ordering::Relaxed);

        let file = File::open(path).map_err(|e| map_io_error(path, e))?;
        let digest = hash_reader(file).map_err(|e| map_io_error(path, e))?;
        log::trace!("Hashed {}: {}", path.display(), digest);
        Ok(digest)
    }
}

/// Compute the digest of everything readable from `reader`.
///
/// # Errors
///
/// Propagates any read error other than `Interrupted`.
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<Digest> {
    let mut md5 = Md5::new();
    let mut buffer = vec![0u8; BLOCK_SIZE];

    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        md5.update(&buffer[..read]);
    }

    Ok(Digest(format!("{:x}", md5.finalize())))
}

fn map_io_error(path: &Path, error: io::Error) -> HashError {
    match error.kind() {
        io::ErrorKind::NotFound => HashError::NotFound(path.to_path_buf()),
        io::ErrorKind::PermissionDenied => HashError::PermissionDenied(path.to_path_buf()),
        _ => HashError::Io {
            path: path.to_path_buf(),
            source: error,
        },
    }
}
