//! Structured error handling and exit codes.

use std::path::PathBuf;

use serde::Serialize;

use crate::remote::RemoteError;
use crate::scanner::ScanError;

/// Exit codes for the uploader.
///
/// - 0: Success (every candidate was uploaded or already present)
/// - 1: General error (fatal run error or unexpected failure)
/// - 2: Aborted (user declined the confirmation prompt)
/// - 3: Partial success (run completed but some files failed)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: Run completed without per-file failures.
    Success = 0,
    /// General error: A fatal error aborted the run.
    GeneralError = 1,
    /// Aborted: The user declined to start the upload.
    Aborted = 2,
    /// Partial success: Run completed but at least one file failed.
    PartialSuccess = 3,
    /// Interrupted: Run was interrupted by user (Ctrl+C).
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "IB000",
            Self::GeneralError => "IB001",
            Self::Aborted => "IB002",
            Self::PartialSuccess => "IB003",
            Self::Interrupted => "IB130",
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "IB001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{:#}", err),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}

/// Errors that abort a whole run before any upload is attempted.
///
/// Per-file problems (unreadable file, rejected upload) never surface here;
/// they are counted as failed outcomes in the run summary instead.
///
/// Messages leave out the cause; render with `{:#}` through [`anyhow`] to
/// get the whole chain.
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    /// Exchanging the login token for a session failed.
    #[error("Authentication failed")]
    Authentication(#[source] RemoteError),

    /// The account's supported file types could not be fetched.
    #[error("Failed to fetch supported file types")]
    SupportedTypes(#[source] RemoteError),

    /// The remote catalog of already uploaded digests could not be fetched.
    #[error("Failed to fetch remote catalog")]
    Catalog(#[source] RemoteError),

    /// The directory to upload cannot be scanned.
    #[error("Directory inaccessible: {path}")]
    DirectoryInaccessible {
        /// Directory given for the run
        path: PathBuf,
        /// Why it could not be scanned
        #[source]
        source: ScanError,
    },

    /// The run was interrupted before uploads started.
    #[error("Interrupted")]
    Interrupted,
}

impl RunError {
    /// Exit code that the binary reports for this error.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Interrupted => ExitCode::Interrupted,
            _ => ExitCode::GeneralError,
        }
    }
}
