//! Rendering of the run summary.
//!
//! - Text: the one-line `Uploaded/Skipped/Failed/Total` summary, followed by
//!   the paths that failed
//! - JSON: the full summary for scripting
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use ibroadcast_uploader::error::ExitCode;
//! use ibroadcast_uploader::output::{JsonOutput, TextOutput};
//! use ibroadcast_uploader::upload::RunSummary;
//!
//! let summary = RunSummary::empty(Utc::now());
//! println!("{}", TextOutput::new(&summary).plain());
//! println!("{}", JsonOutput::new(&summary, ExitCode::Success).to_json_pretty().unwrap());
//! ```

pub mod json;
pub mod text;

pub use json::JsonOutput;
pub use text::TextOutput;
