//! # s3zipper Main Entry Point
//!
//! File: cli/src/main.rs
//!
//! ## Overview
//!
//! Entry point of the s3zipper CLI. It handles:
//! - Command-line argument parsing using Clap
//! - Setting up the logging system based on verbosity flags
//! - Loading configuration and constructing the storage client
//! - Running the archive command, racing it against Ctrl+C / SIGTERM
//! - Mapping the outcome to the process exit status
//!
//! ## Exit status
//!
//! - `0`: every dataset was uploaded, skipped or (dry run) planned
//! - `1`: a fatal error, or at least one dataset failed
//! - `130`: interrupted; scratch files are removed, nothing is left half-uploaded
//!
//! ## Examples
//!
//! ```bash
//! s3zipper --bucket my-bucket --src-prefix raw_data/public/ \
//!     --dest-prefix raw_data/public_zipped/
//!
//! # Increase verbosity
//! s3zipper -vv --bucket my-bucket --src-prefix raw/ --dest-prefix zipped/ --dry-run
//! ```
//!
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

mod commands; // The archive command
mod common; // Shared utilities (archive, fs, storage)
mod core; // Core infrastructure (errors, config)

use crate::commands::archive::{self, ArchiveArgs, RunConfig, RunReport};
use crate::common::storage;
use crate::core::config;
use crate::core::error::Result;

const EXIT_FAILURE: i32 = 1;
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser, Debug)]
#[command(
    name = "s3zipper",
    about = "🗜️ s3zipper: Zip every dataset folder under an object-storage prefix",
    long_about = "Streams each immediate child folder of --src-prefix into its own deflate ZIP\n\
                  and uploads it to <dest-prefix>/<folder>.zip. Existing archives are skipped\n\
                  unless --overwrite is given.",
    version
)]
struct Cli {
    #[command(flatten)]
    archive: ArchiveArgs,

    /// Configuration file (default: the user config directory's config.toml).
    #[arg(long, env = "S3ZIPPER_CONFIG")]
    config: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    tracing::debug!("Parsed CLI arguments: {:?}", cli);

    // Dropping the run future on a signal drops every in-flight scratch
    // directory and abandons any multipart upload before the process exits.
    let outcome = tokio::select! {
        result = run(cli) => Some(result),
        _ = shutdown_signal() => None,
    };

    match outcome {
        Some(Ok(report)) if report.is_success() => Ok(()),
        Some(Ok(report)) => {
            error!("{} dataset(s) failed", report.failures.len());
            std::process::exit(EXIT_FAILURE);
        }
        Some(Err(e)) => {
            error!("Run failed: {:?}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(EXIT_FAILURE);
        }
        None => {
            eprintln!("Interrupted; no partial archives were uploaded.");
            std::process::exit(EXIT_INTERRUPTED);
        }
    }
}

async fn run(cli: Cli) -> Result<RunReport> {
    let config = config::load_config(cli.config.as_deref())?;
    let run = RunConfig::resolve(cli.archive, &config)?;
    let storage = storage::connect(&config.storage, &[&run.bucket, &run.dest_bucket])?;
    info!(
        "Archiving {}/{} into {}/{}",
        run.bucket, run.src_prefix, run.dest_bucket, run.dest_prefix
    );
    archive::handle_archive(&run, Arc::clone(&storage)).await
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, stopping..."),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
                info!("Received SIGTERM, stopping...");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
