//! Ctrl+C handling.
//!
//! An interrupt sets a shared `AtomicBool`. The walker and the reconciler
//! poll it between files and end the run with [`crate::error::RunError::Interrupted`];
//! uploads that have already been dispatched are left to finish.
//!
//! ```rust,no_run
//! use ibroadcast_uploader::signal::install_handler;
//!
//! let shutdown = install_handler()?;
//! let flag = shutdown.flag();
//! // hand `flag` to UploadRun::with_shutdown_flag
//! # Ok::<(), ibroadcast_uploader::signal::SignalError>(())
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared interrupt flag.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
}

impl Shutdown {
    /// A flag that is not set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an interrupt arrived.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Set the flag as if Ctrl+C was pressed.
    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clear the flag for a new run.
    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// The underlying flag, for the walker and reconciler.
    #[must_use]
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

/// The Ctrl+C handler could not be registered.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// The OS refused the handler.
    #[error("Failed to install Ctrl+C handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static INSTALLED: OnceLock<Shutdown> = OnceLock::new();

/// Register the process-wide Ctrl+C handler and return its flag, cleared.
///
/// The handler is registered once; later calls return the same flag, so a
/// process can start several runs.
///
/// # Errors
///
/// Returns [`SignalError`] if the OS refuses the handler.
pub fn install_handler() -> Result<Shutdown, SignalError> {
    if let Some(existing) = INSTALLED.get() {
        existing.clear();
        return Ok(existing.clone());
    }

    let shutdown = Shutdown::new();
    let flag = shutdown.flag();
    let registered = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "\nInterrupted, stopping after the current file...");
        let _ = stderr.flush();
        log::info!("Interrupt received");
    });

    match registered {
        Ok(()) => Ok(INSTALLED.get_or_init(|| shutdown).clone()),
        // Another thread or an embedding program registered first; hand out
        // a flag that only `request()` can set.
        Err(ctrlc::Error::MultipleHandlers) => {
            log::debug!("Ctrl+C handler owned elsewhere, interrupts will not be observed");
            let fallback = INSTALLED.get_or_init(Shutdown::new);
            fallback.clear();
            Ok(fallback.clone())
        }
        Err(e) => Err(e.into()),
    }
}
