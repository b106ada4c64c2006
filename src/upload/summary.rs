//! Per-file outcomes and run-level tallies.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// What happened to one candidate file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadOutcome {
    /// Digest already in the remote catalog; no transfer attempted.
    Skipped,
    /// Transfer acknowledged by the service.
    Uploaded,
    /// Hashing or transfer failed.
    Failed,
}

/// Outcome for a single candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    /// Candidate path
    pub path: PathBuf,
    /// What happened to it
    pub outcome: UploadOutcome,
}

impl FileOutcome {
    /// Create a new outcome record.
    #[must_use]
    pub fn new(path: PathBuf, outcome: UploadOutcome) -> Self {
        Self { path, outcome }
    }
}

/// Final tallies for one run.
///
/// Every count is tallied from per-file outcomes, so
/// `uploaded + skipped + failed == total` holds by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Number of candidate files
    pub total: usize,
    /// Files already present remotely
    pub skipped: usize,
    /// Files acknowledged by the service
    pub uploaded: usize,
    /// Files that could not be hashed or uploaded
    pub failed: usize,
    /// Paths counted in `failed`, sorted
    pub failed_paths: Vec<PathBuf>,
    /// Files whose digest had to be computed this run
    pub files_hashed: u64,
    /// Files whose digest came from the local cache
    pub cache_hits: usize,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    /// Summary of a run with no candidates.
    #[must_use]
    pub fn empty(started_at: DateTime<Utc>) -> Self {
        Self {
            total: 0,
            skipped: 0,
            uploaded: 0,
            failed: 0,
            failed_paths: Vec::new(),
            files_hashed: 0,
            cache_hits: 0,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Tally per-file outcomes.
    #[must_use]
    pub fn from_outcomes(
        outcomes: impl IntoIterator<Item = FileOutcome>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let mut summary = Self::empty(started_at);
        for FileOutcome { path, outcome } in outcomes {
            summary.total += 1;
            match outcome {
                UploadOutcome::Skipped => summary.skipped += 1,
                UploadOutcome::Uploaded => summary.uploaded += 1,
                UploadOutcome::Failed => {
                    summary.failed += 1;
                    summary.failed_paths.push(path);
                }
            }
        }
        summary.failed_paths.sort();
        summary.finished_at = Utc::now();
        summary
    }

    /// `total - skipped - failed`, clamped at zero.
    ///
    /// Equal to `uploaded` whenever every non-skipped, non-failed file was
    /// acknowledged. Kept for display compatibility; `uploaded` is the
    /// tallied value.
    #[must_use]
    pub fn derived_uploaded(&self) -> usize {
        self.total.saturating_sub(self.skipped + self.failed)
    }

    /// Whether the counts add up.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.uploaded + self.skipped + self.failed == self.total
            && self.failed_paths.len() == self.failed
    }

    /// Whether any file failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Uploaded/Skipped/Failed/Total: {}/{}/{}/{}.",
            self.uploaded, self.skipped, self.failed, self.total
        )
    }
}
