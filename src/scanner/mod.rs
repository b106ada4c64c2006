//! Scanner module for candidate discovery and content hashing.
//!
//! This module provides functionality for:
//! - Directory walking using jwalk, restricted to the account's supported file types
//! - Streaming MD5 content digests
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and candidate discovery
//! - [`hasher`]: MD5 file hashing (streaming)
//!
//! # Example
//!
//! ```no_run
//! use ibroadcast_uploader::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig::with_extensions(["mp3", ".flac"]);
//! let walker = Walker::new(Path::new("."), config);
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hasher;
pub mod walker;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub use hasher::{Digest, DigestParseError, Hasher, BLOCK_SIZE};
pub use walker::Walker;

/// A file eligible for upload consideration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Absolute path to the file
    pub path: PathBuf,
    /// File size in bytes at scan time
    pub size: u64,
}

impl FileEntry {
    /// Create a new FileEntry.
    #[must_use]
    pub fn new(path: PathBuf, size: u64) -> Self {
        Self { path, size }
    }

    /// Lowercased extension without the leading dot, if any.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_lowercase)
    }
}

/// Configuration for directory walking.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Follow symbolic links during traversal.
    /// Warning: May cause infinite loops with symlink cycles.
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Accepted extensions, normalized (lowercase, no leading dot).
    /// `None` accepts every extension.
    pub extensions: Option<HashSet<String>>,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            skip_hidden: true,
            extensions: None,
        }
    }
}

impl WalkerConfig {
    /// Create a configuration that only accepts the given extensions.
    ///
    /// Extensions may be given with or without a leading dot and in any case,
    /// matching how the remote service reports them (`.mp3`).
    #[must_use]
    pub fn with_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: Some(
                extensions
                    .into_iter()
                    .map(|e| normalize_extension(e.as_ref()))
                    .filter(|e| !e.is_empty())
                    .collect(),
            ),
            ..Default::default()
        }
    }

    /// Set whether symbolic links are followed.
    #[must_use]
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Whether a path has an accepted extension.
    #[must_use]
    pub fn accepts(&self, path: &Path) -> bool {
        let Some(ref allowed) = self.extensions else {
            return true;
        };
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| allowed.contains(&ext.to_lowercase()))
    }
}

/// Normalize an extension for comparison: lowercase, no leading dot.
#[must_use]
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
