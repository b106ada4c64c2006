//! Human-readable output for the run summary.

use std::fmt::Write as _;
use std::io::Write;

use yansi::Paint;

use crate::upload::RunSummary;

/// Text rendering of a [`RunSummary`].
#[derive(Debug, Clone, Copy)]
pub struct TextOutput<'a> {
    summary: &'a RunSummary,
}

impl<'a> TextOutput<'a> {
    /// Wrap a summary for display.
    #[must_use]
    pub fn new(summary: &'a RunSummary) -> Self {
        Self { summary }
    }

    /// Summary line and failed paths without colors.
    #[must_use]
    pub fn plain(&self) -> String {
        let mut out = self.summary.to_string();
        for path in &self.summary.failed_paths {
            let _ = write!(out, "\n  failed: {}", path.display());
        }
        out
    }

    /// Summary line and failed paths, colored unless `no_color` is set.
    #[must_use]
    pub fn render(&self, no_color: bool) -> String {
        if no_color {
            return self.plain();
        }

        let s = self.summary;
        let failed = if s.failed > 0 {
            s.failed.red().bold().to_string()
        } else {
            s.failed.to_string()
        };
        let mut out = format!(
            "Uploaded/Skipped/Failed/Total: {}/{}/{}/{}.",
            s.uploaded.green().bold(),
            s.skipped.cyan(),
            failed,
            s.total.bold()
        );
        for path in &s.failed_paths {
            let _ = write!(out, "\n  {} {}", "failed:".red(), path.display());
        }
        out
    }

    /// Write the rendered summary followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, mut writer: W, no_color: bool) -> std::io::Result<()> {
        writeln!(writer, "{}", self.render(no_color))
    }
}
