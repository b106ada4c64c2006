//! JSON output for the run summary.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "summary": {
//!     "total": 12,
//!     "skipped": 9,
//!     "uploaded": 2,
//!     "failed": 1,
//!     "failed_paths": ["/music/broken.mp3"],
//!     "files_hashed": 3,
//!     "cache_hits": 9,
//!     "started_at": "2024-05-01T12:00:00Z",
//!     "finished_at": "2024-05-01T12:03:10Z"
//!   },
//!   "duration_ms": 190000,
//!   "exit_code": 3,
//!   "exit_code_name": "IB003"
//! }
//! ```

use std::io::Write;

use serde::Serialize;

use crate::error::ExitCode;
use crate::upload::RunSummary;

/// Complete JSON output structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput<'a> {
    /// Run tallies
    pub summary: &'a RunSummary,
    /// Wall time of the reconcile and upload phases
    pub duration_ms: i64,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "IB000")
    pub exit_code_name: &'static str,
}

impl<'a> JsonOutput<'a> {
    /// Wrap a summary and the exit code it leads to.
    #[must_use]
    pub fn new(summary: &'a RunSummary, exit_code: ExitCode) -> Self {
        Self {
            summary,
            duration_ms: (summary.finished_at - summary.started_at).num_milliseconds(),
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix(),
        }
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write pretty-printed JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)
    }
}
