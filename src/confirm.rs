//! Interactive confirmation before uploading.
//!
//! The prompt offers two choices: `L` lists the candidate files once and
//! asks again, `U` starts the upload. Anything else (including end of input,
//! or a second `L`) cancels the run.

use std::io::{self, BufRead, Write};

use bytesize::ByteSize;

use crate::scanner::FileEntry;

/// Answer to the confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Start the upload.
    Upload,
    /// Cancel the run.
    Abort,
}

/// Ask whether to upload `files`, reading answers from `input`.
///
/// # Errors
///
/// Returns an I/O error if the prompt cannot be written or read.
///
/// # Examples
///
/// ```
/// use ibroadcast_uploader::confirm::{confirm_upload, Decision};
/// use ibroadcast_uploader::scanner::FileEntry;
///
/// let files = vec![FileEntry::new("a.mp3".into(), 1024)];
/// let mut out = Vec::new();
/// let decision = confirm_upload(&files, &b"u\n"[..], &mut out).unwrap();
/// assert_eq!(decision, Decision::Upload);
/// ```
pub fn confirm_upload<R: BufRead, W: Write>(
    files: &[FileEntry],
    mut input: R,
    mut output: W,
) -> io::Result<Decision> {
    let total: u64 = files.iter().map(|f| f.size).sum();
    writeln!(
        output,
        "Found {} files ({}). Press 'L' to list, or 'U' to start the upload.",
        files.len(),
        ByteSize::b(total)
    )?;

    let mut answer = read_answer(&mut input, &mut output)?;
    if answer.as_deref() == Some("l") {
        writeln!(output, "Listing found, supported files")?;
        for file in files {
            writeln!(output, " - {}", file.path.display())?;
        }
        writeln!(output, "Press 'U' to start the upload if this looks reasonable.")?;
        answer = read_answer(&mut input, &mut output)?;
    }

    if answer.as_deref() == Some("u") {
        return Ok(Decision::Upload);
    }
    log::debug!("Confirmation answered with {:?}, aborting", answer);
    writeln!(output, "Aborted.")?;
    Ok(Decision::Abort)
}

/// One trimmed, lowercased answer; `None` at end of input.
fn read_answer<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> io::Result<Option<String>> {
    write!(output, "> ")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_ascii_lowercase()))
}
