//! Command-line interface definitions for ibup.
//!
//! Arguments are defined with the clap derive API. Values left unset here
//! fall back to the configuration file and `IBUP_*` environment variables
//! (see [`crate::config`]).
//!
//! # Example
//!
//! ```bash
//! # Upload the current directory
//! ibup <LOGIN_TOKEN>
//!
//! # Upload a directory with 5 parallel uploads, tagging every track
//! ibup <LOGIN_TOKEN> ~/Music -p 5 --tag "2024 rips"
//!
//! # Skip the prompt and print the summary as JSON
//! ibup <LOGIN_TOKEN> ~/Music -y --output json
//! ```

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::upload::MAX_PARALLEL_UPLOADS;

/// Upload a music library to iBroadcast, skipping files already stored.
///
/// Files are identified by content digest, so renamed or moved tracks are
/// never uploaded twice. Digests are cached locally between runs.
#[derive(Debug, Parser)]
#[command(name = "ibup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Login token, generated in the iBroadcast app settings
    #[arg(value_name = "LOGIN_TOKEN")]
    pub login_token: String,

    /// Directory to upload (default: current directory)
    #[arg(value_name = "DIRECTORY")]
    pub directory: Option<PathBuf>,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, visible_alias = "silent", conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Number of parallel uploads (1-6, default: 3)
    #[arg(short = 'p', long, value_name = "N", value_parser = parse_parallel)]
    pub parallel_uploads: Option<usize>,

    /// Add uploaded files to this playlist
    #[arg(short = 'l', long, value_name = "NAME")]
    pub playlist: Option<String>,

    /// Tag uploaded files
    #[arg(short = 't', long, value_name = "TAG")]
    pub tag: Option<String>,

    /// Upload files even if they are already in the library
    #[arg(short = 'r', long)]
    pub reupload: bool,

    /// Recalculate every digest instead of reading the cache
    ///
    /// New digests are still written back to the cache.
    #[arg(short = 'n', long)]
    pub no_cache: bool,

    /// Path to the hash cache file (default: ~/.ibroadcast_md5s)
    #[arg(long, value_name = "PATH")]
    pub cache: Option<PathBuf>,

    /// Drop cache entries for files that no longer exist
    #[arg(long)]
    pub prune_cache: bool,

    /// Follow symbolic links while scanning
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to a configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format for the run summary
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Print errors as structured JSON on stderr
    #[arg(long)]
    pub json_errors: bool,
}

impl Cli {
    /// Directory to upload, defaulting to the current directory.
    #[must_use]
    pub fn directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Output format for the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary line
    #[default]
    Text,
    /// JSON document for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Parse the parallel upload count.
///
/// # Examples
///
/// ```
/// use ibroadcast_uploader::cli::parse_parallel;
///
/// assert_eq!(parse_parallel("4").unwrap(), 4);
/// assert!(parse_parallel("0").is_err());
/// assert!(parse_parallel("7").is_err());
/// ```
///
/// # Errors
///
/// Returns an error if the value is not a number between 1 and 6.
pub fn parse_parallel(s: &str) -> Result<usize, String> {
    let n: usize = s
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number: '{s}'"))?;
    if (1..=MAX_PARALLEL_UPLOADS).contains(&n) {
        Ok(n)
    } else {
        Err(format!(
            "Parallel uploads must be between 1 and {MAX_PARALLEL_UPLOADS}"
        ))
    }
}
