//! # s3zipper Run Configuration
//!
//! File: cli/src/commands/archive/config.rs
//!
//! ## Overview
//!
//! Command-line arguments of the archive run and the immutable `RunConfig`
//! built from them. Settings are merged in this order (highest first):
//! 1. Command-line flags
//! 2. The loaded configuration file (`core::config::Config`)
//! 3. Default values
//!
//! The destination bucket defaults to the source bucket.
//!
use crate::common::fs::io::ensure_dir_exists;
use crate::common::storage::DELIMITER;
use crate::core::config::Config;
use crate::core::error::{Result, ZipperError};
use anyhow::anyhow;
use clap::Args;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Arguments selecting what to archive and where the archives go.
#[derive(Args, Debug, Clone)]
pub struct ArchiveArgs {
    /// Source bucket.
    #[arg(long)]
    pub bucket: String,

    /// Source prefix; each immediate child folder is archived as one dataset
    /// (e.g. `raw_data/public/`).
    #[arg(long)]
    pub src_prefix: String,

    /// Destination bucket. Defaults to `--bucket`.
    #[arg(long)]
    pub dest_bucket: Option<String>,

    /// Destination prefix for the archives (e.g. `raw_data/public_zipped/`).
    #[arg(long)]
    pub dest_prefix: String,

    /// Rebuild and replace archives that already exist.
    #[arg(long)]
    pub overwrite: bool,

    /// Report what would be done without building or uploading anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Number of datasets processed concurrently (default: 1, or `archive.jobs`).
    #[arg(long)]
    pub jobs: Option<usize>,

    /// Directory in which per-dataset scratch directories are created
    /// (default: system temp dir, or `archive.scratch_dir`).
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,
}

/// Effective settings for one invocation. Never mutated after `resolve`.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub bucket: String,
    pub src_prefix: String,
    pub dest_bucket: String,
    pub dest_prefix: String,
    pub overwrite: bool,
    pub dry_run: bool,
    pub jobs: usize,
    pub scratch_dir: Option<PathBuf>,
}

impl RunConfig {
    /// Merges `args` over `config` and validates the result.
    pub fn resolve(args: ArchiveArgs, config: &Config) -> Result<Self> {
        if args.bucket.trim().is_empty() {
            return Err(anyhow!(ZipperError::Config(
                "--bucket must not be empty.".to_string()
            )));
        }
        let dest_bucket = match args.dest_bucket {
            Some(bucket) if !bucket.trim().is_empty() => bucket,
            Some(_) => {
                return Err(anyhow!(ZipperError::Config(
                    "--dest-bucket must not be empty.".to_string()
                )))
            }
            None => args.bucket.clone(),
        };

        let jobs = args.jobs.unwrap_or(config.archive.jobs);
        if jobs == 0 {
            return Err(anyhow!(ZipperError::Config(
                "--jobs must be at least 1.".to_string()
            )));
        }

        let scratch_dir = args
            .scratch_dir
            .or_else(|| config.archive.scratch_dir.as_ref().map(PathBuf::from));
        if let Some(dir) = &scratch_dir {
            ensure_dir_exists(dir)?;
        }

        let run = Self {
            bucket: args.bucket,
            src_prefix: args.src_prefix,
            dest_bucket,
            dest_prefix: args.dest_prefix,
            overwrite: args.overwrite,
            dry_run: args.dry_run,
            jobs,
            scratch_dir,
        };
        if run.dest_inside_source() {
            // The archives would show up as a dataset folder on the next run.
            warn!(
                "Destination prefix '{}' lies inside source prefix '{}' of bucket '{}'.",
                run.dest_prefix, run.src_prefix, run.bucket
            );
        }
        debug!("Resolved run configuration: {:?}", run);
        Ok(run)
    }

    /// Destination key of the archive for the dataset called `name`.
    pub fn archive_key(&self, name: &str) -> String {
        let prefix = self.dest_prefix.trim_matches(DELIMITER);
        if prefix.is_empty() {
            format!("{}.zip", name)
        } else {
            format!("{}{}{}.zip", prefix, DELIMITER, name)
        }
    }

    fn dest_inside_source(&self) -> bool {
        let src = self.src_prefix.trim_matches(DELIMITER);
        let dest = self.dest_prefix.trim_matches(DELIMITER);
        self.bucket == self.dest_bucket
            && (src.is_empty()
                || dest == src
                || dest.starts_with(&format!("{}{}", src, DELIMITER)))
    }
}
