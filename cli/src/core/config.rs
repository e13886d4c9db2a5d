//! # s3zipper Configuration System
//!
//! File: cli/src/core/config.rs
//!
//! ## Overview
//!
//! This module loads the settings that do not belong on every command line:
//! which storage backend to talk to, its region/endpoint and timeouts, how many
//! datasets to process at once, and where scratch archives are written.
//!
//! ## Architecture
//!
//! Configuration sources (in order of precedence):
//! 1. An explicit file passed with `--config` (or `S3ZIPPER_CONFIG`)
//! 2. User-specific `config.toml` in the platform config directory
//!    (e.g. `~/.config/s3zipper/config.toml` on Linux)
//! 3. Default values defined in the code
//!
//! Command-line flags are merged on top of the loaded `Config` by
//! `commands::archive::config::RunConfig::resolve`.
//!
//! ## Examples
//!
//! ```toml
//! [storage]
//! backend = "s3"
//! region = "eu-west-1"
//! endpoint = "http://localhost:9000"
//! allow_http = true
//! request_timeout_secs = 600
//!
//! [archive]
//! jobs = 2
//! scratch_dir = "~/scratch"
//! ```
//!
//! ```rust
//! let cfg = config::load_config(cli.config.as_deref())?;
//! let storage = storage::connect(&cfg.storage, &[&run.bucket, &run.dest_bucket])?;
//! ```
//!
use crate::core::error::{Result, ZipperError};
use anyhow::{anyhow, Context};
use directories::ProjectDirs;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// Represents the main configuration structure, loaded from TOML files.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)] // Error if unknown fields are in TOML
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
}

/// Which object-storage implementation buckets are resolved against.
#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Amazon S3 or any S3-compatible service (MinIO, Ceph, R2...).
    #[default]
    S3,
    /// Buckets are directories under `local_root`.
    Local,
}

/// Connection settings for the storage backend.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: Backend,
    /// AWS region. Falls back to `AWS_REGION` / `AWS_DEFAULT_REGION`.
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services.
    pub endpoint: Option<String>,
    /// Permit plain `http://` endpoints.
    #[serde(default)]
    pub allow_http: bool,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Upper bound on a single request, including body transfer.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Root directory of the local backend (can use ~). Will be expanded.
    pub local_root: Option<String>,
}

/// Settings for how datasets are processed.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Number of datasets processed concurrently.
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    /// Parent directory for per-dataset scratch directories (can use ~).
    /// Defaults to the system temp directory.
    pub scratch_dir: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            region: None,
            endpoint: None,
            allow_http: false,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            local_root: None,
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            scratch_dir: None,
        }
    }
}

fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_request_timeout_secs() -> u64 {
    // Large members are streamed through a single GET, so this is generous.
    30 * 60
}
fn default_jobs() -> usize {
    1
}

const USER_CONFIG_FILENAME: &str = "config.toml";

/// Loads, expands and validates the configuration.
///
/// When `explicit` is given, that file must exist and replaces the user
/// configuration entirely. Otherwise the user file is used if present, and
/// built-in defaults if not.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut config = match explicit {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            load_config_from_path(path)?
        }
        None => load_user_config()?.unwrap_or_default(),
    };
    expand_config_paths(&mut config).context("Failed to expand paths in configuration")?;
    validate_config(&config).context("Configuration validation failed")?;
    debug!("Final loaded configuration: {:?}", config);
    Ok(config)
}

fn load_user_config() -> Result<Option<Config>> {
    let Some(proj_dirs) = ProjectDirs::from("com", "s3zipper", "s3zipper") else {
        debug!("Could not determine user config directory.");
        return Ok(None);
    };
    let config_path = proj_dirs.config_dir().join(USER_CONFIG_FILENAME);
    if config_path.is_file() {
        info!("Loading user configuration from: {}", config_path.display());
        load_config_from_path(&config_path).map(Some)
    } else {
        debug!(
            "User configuration file not found at {}",
            config_path.display()
        );
        Ok(None)
    }
}

fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML from file: {}", path.display()))
}

fn expand_config_paths(config: &mut Config) -> Result<()> {
    if let Some(root) = config.storage.local_root.as_mut() {
        *root = shellexpand::tilde(root.as_str()).into_owned();
        debug!("Expanded local storage root: {}", root);
    }
    if let Some(dir) = config.archive.scratch_dir.as_mut() {
        *dir = shellexpand::tilde(dir.as_str()).into_owned();
        debug!("Expanded scratch directory: {}", dir);
    }
    Ok(())
}

fn validate_config(config: &Config) -> Result<()> {
    if config.archive.jobs == 0 {
        return Err(anyhow!(ZipperError::Config(
            "archive.jobs must be at least 1.".to_string()
        )));
    }
    if config.storage.connect_timeout_secs == 0 || config.storage.request_timeout_secs == 0 {
        return Err(anyhow!(ZipperError::Config(
            "storage timeouts must be greater than zero.".to_string()
        )));
    }
    if config.storage.backend == Backend::Local {
        let root = config.storage.local_root.as_deref().ok_or_else(|| {
            anyhow!(ZipperError::Config(
                "storage.local_root is required when backend = \"local\".".to_string()
            ))
        })?;
        if !PathBuf::from(root).is_dir() {
            return Err(anyhow!(ZipperError::Config(format!(
                "Local storage root '{}' is not a directory.",
                root
            ))));
        }
    }
    if let Some(endpoint) = &config.storage.endpoint {
        if endpoint.starts_with("http://") && !config.storage.allow_http {
            return Err(anyhow!(ZipperError::Config(format!(
                "Endpoint '{}' uses plain HTTP; set storage.allow_http = true to permit it.",
                endpoint
            ))));
        }
    }
    Ok(())
}
