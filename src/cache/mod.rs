//! Hash caching module.
//!
//! This module persists the digest computed for each local file so that
//! later runs can skip re-hashing files they have seen before.
//!
//! # Format
//!
//! The cache is a single JSON object mapping absolute file path to MD5 hex
//! digest, stored at `~/.ibroadcast_md5s` by default:
//!
//! ```json
//! {
//!   "/home/user/Music/a.mp3": "5eb63bbbe01eeed093cb22bb8f5acdc3"
//! }
//! ```
//!
//! A missing or unreadable file loads as an empty cache, and entries whose
//! value is not a valid digest are dropped individually.
//!
//! # Staleness
//!
//! Entries are keyed by path only. A file edited in place keeps its old
//! digest until the cache is bypassed with forced re-hashing.

pub mod store;

pub use store::{default_cache_path, CacheError, CacheResult, HashCache, CACHE_FILE_NAME};
