//! Application configuration management.
//!
//! Settings are layered with figment, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. TOML file (`config.toml` in the platform config directory, or `--config`)
//! 3. `IBUP_*` environment variables (e.g. `IBUP_PARALLEL_UPLOADS=5`)
//!
//! Command-line flags are applied on top by [`crate::run_app`].

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::remote::http::{DEFAULT_API_URL, DEFAULT_UPLOAD_URL};
use crate::remote::HttpRemoteConfig;
use crate::upload::{DEFAULT_PARALLEL_UPLOADS, MAX_PARALLEL_UPLOADS};

/// Prefix for configuration environment variables.
pub const ENV_PREFIX: &str = "IBUP_";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Uploads in flight at once (1-6).
    pub parallel_uploads: usize,
    /// Hash cache location. `None` uses `~/.ibroadcast_md5s`.
    pub cache_path: Option<PathBuf>,
    /// Read digests from the cache. New digests are written back either way.
    pub use_cache: bool,
    /// Drop cache entries for vanished files.
    pub prune_cache: bool,
    /// JSON API endpoint.
    pub api_url: String,
    /// Upload and catalog endpoint.
    pub upload_url: String,
    /// Per-request timeout in seconds. `None` waits indefinitely.
    pub request_timeout_secs: Option<u64>,
    /// Upload without asking.
    pub skip_confirmation: bool,
    /// Follow symbolic links while scanning.
    pub follow_symlinks: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            parallel_uploads: DEFAULT_PARALLEL_UPLOADS,
            cache_path: None,
            use_cache: true,
            prune_cache: false,
            api_url: DEFAULT_API_URL.to_string(),
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            request_timeout_secs: None,
            skip_confirmation: false,
            follow_symlinks: false,
        }
    }
}

impl Config {
    /// Load configuration from the default file location and environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or environment holds invalid values.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from_path(&path),
            None => Self::figment(None)
                .extract::<Self>()
                .context("Invalid configuration in environment")
                .and_then(Self::validated),
        }
    }

    /// Load configuration from a specific file and the environment.
    ///
    /// A missing file is not an error; defaults and environment apply.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or holds invalid values.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        log::debug!("Loading configuration from {}", path.display());
        Self::figment(Some(path))
            .extract::<Self>()
            .with_context(|| format!("Invalid configuration in {}", path.display()))
            .and_then(Self::validated)
    }

    fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Platform-specific configuration file path.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "ibroadcast", "ibup")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_PARALLEL_UPLOADS).contains(&self.parallel_uploads) {
            bail!(
                "parallel_uploads must be between 1 and {}, got {}",
                MAX_PARALLEL_UPLOADS,
                self.parallel_uploads
            );
        }
        if self.api_url.trim().is_empty() || self.upload_url.trim().is_empty() {
            bail!("api_url and upload_url must not be empty");
        }
        if self.request_timeout_secs == Some(0) {
            bail!("request_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    fn validated(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    /// Settings for the HTTP client.
    #[must_use]
    pub fn remote_config(&self) -> HttpRemoteConfig {
        HttpRemoteConfig {
            api_url: self.api_url.clone(),
            upload_url: self.upload_url.clone(),
            timeout: self.request_timeout_secs.map(Duration::from_secs),
        }
    }
}
