//! ibroadcast-uploader - deduplicating music uploader
//!
//! Uploads a directory of audio files to an iBroadcast account, skipping any
//! file whose content digest the account already stores. Digests are cached
//! locally so unchanged files are only hashed once.

pub mod cache;
pub mod cli;
pub mod config;
pub mod confirm;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod remote;
pub mod scanner;
pub mod signal;
pub mod upload;

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cache::{default_cache_path, HashCache};
use crate::cli::{Cli, OutputFormat};
use crate::config::Config;
use crate::confirm::{confirm_upload, Decision};
use crate::error::{ExitCode, RunError};
use crate::output::{JsonOutput, TextOutput};
use crate::progress::Progress;
use crate::remote::{HttpRemote, RemoteService};
use crate::upload::{RunOptions, RunSummary, UploadRun};

/// Run the application from parsed arguments.
///
/// # Errors
///
/// Returns an error for invalid configuration and fatal run errors
/// ([`RunError`]); per-file failures are reported through the exit code.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    if cli.no_color {
        yansi::disable();
    }

    let config = match cli.config {
        Some(ref path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    let mut remote_config = config.remote_config();
    if let Some(secs) = cli.timeout {
        remote_config.timeout = Some(std::time::Duration::from_secs(secs));
    }
    let remote = HttpRemote::new(remote_config).context("Failed to create HTTP client")?;

    run_with_remote(&cli, &config, &remote)
}

/// Run against a specific [`RemoteService`], with settings already loaded.
///
/// # Errors
///
/// Returns fatal [`RunError`]s wrapped in [`anyhow::Error`].
pub fn run_with_remote(cli: &Cli, config: &Config, remote: &dyn RemoteService) -> Result<ExitCode> {
    let shutdown = signal::install_handler()?;
    let options = run_options(cli, config);
    log::debug!("Run options: {:?}", options);

    log::info!("Logging in");
    let session = remote
        .login(&cli.login_token)
        .map_err(RunError::Authentication)?;
    log::debug!("Authenticated as user {}", session.user_id);

    let cache = load_cache(cli, config);
    let hide_progress = cli.quiet || cli.verbose > 0 || cli.output == OutputFormat::Json;
    let mut upload_run = UploadRun::new(remote, session, cache, options)
        .with_progress_callback(Arc::new(Progress::new(hide_progress)))
        .with_shutdown_flag(shutdown.flag());

    let candidates = upload_run.scan()?;

    let skip_prompt = cli.yes || config.skip_confirmation;
    if !skip_prompt && !candidates.is_empty() {
        let stdin = io::stdin();
        let decision = confirm_upload(&candidates, stdin.lock(), io::stdout())
            .context("Failed to read confirmation")?;
        if decision == Decision::Abort {
            return Ok(ExitCode::Aborted);
        }
    }

    let summary = upload_run.process(candidates)?;
    if shutdown.is_requested() {
        log::info!("Interrupted after uploads were dispatched; all transfers completed");
    }

    let exit_code = if summary.has_failures() {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    };
    print_summary(cli, &summary, exit_code)?;
    Ok(exit_code)
}

/// Merge CLI flags over configuration.
#[must_use]
pub fn run_options(cli: &Cli, config: &Config) -> RunOptions {
    RunOptions::new(cli.directory())
        .with_parallel_uploads(cli.parallel_uploads.unwrap_or(config.parallel_uploads))
        .with_force_reupload(cli.reupload)
        .with_force_rehash(cli.no_cache || !config.use_cache)
        .with_follow_symlinks(cli.follow_symlinks || config.follow_symlinks)
        .with_prune_cache(cli.prune_cache || config.prune_cache)
        .with_tag(cli.tag.clone())
        .with_playlist(cli.playlist.clone())
}

fn load_cache(cli: &Cli, config: &Config) -> HashCache {
    let path = cli
        .cache
        .clone()
        .or_else(|| config.cache_path.clone())
        .or_else(default_cache_path);

    match path {
        Some(path) => HashCache::load(&path),
        None => {
            log::warn!("Could not determine home directory, digests will not be cached");
            HashCache::in_memory()
        }
    }
}

fn print_summary(cli: &Cli, summary: &RunSummary, exit_code: ExitCode) -> Result<()> {
    let stdout = io::stdout();
    match cli.output {
        OutputFormat::Text => TextOutput::new(summary).write_to(stdout.lock(), cli.no_color)?,
        OutputFormat::Json => JsonOutput::new(summary, exit_code).write_to(stdout.lock())?,
    }
    Ok(())
}
