//! # s3zipper Error Types
//!
//! File: cli/src/core/error.rs
//!
//! ## Overview
//!
//! This module defines the error types used throughout s3zipper. Every
//! failure a dataset can hit while it is checked, streamed or uploaded has a
//! named variant here, so the run loop can report *which stage* broke without
//! parsing messages.
//!
//! ## Architecture
//!
//! The error system consists of two main components:
//! - `ZipperError`: A custom error enum using `thiserror` for specific error kinds
//! - `Result<T>`: A type alias for `anyhow::Result<T>` for flexible error handling
//!
//! Functions return `Result<T>` and attach context with `anyhow::Context`.
//! Callers that need the kind of a failure recover it with `downcast_ref`:
//!
//! ```rust
//! match publish::publish_dataset(storage, &run, &dataset).await {
//!     Ok(outcome) => println!("{:?}", outcome),
//!     Err(e) => match Stage::of(&e) {
//!         Stage::Check => eprintln!("probe failed: {e:#}"),
//!         other => eprintln!("{other} failed: {e:#}"),
//!     },
//! }
//! ```
//!
use std::fmt;
use thiserror::Error;

/// Custom error type for the s3zipper application.
#[derive(Error, Debug)]
pub enum ZipperError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Filesystem error: {0}")]
    FileSystem(String),

    #[error("Bucket '{name}' is not registered with the storage client.")]
    UnknownBucket { name: String },

    #[error("Object storage request failed: {source}")]
    ObjectStore {
        #[from]
        source: object_store::Error,
    },

    /// The existence probe failed for a reason other than "not found".
    #[error("Existence check for '{location}' failed: {message}")]
    Probe { location: String, message: String },

    /// Reading a member object or writing its archive entry failed.
    #[error("Streaming '{key}' into the archive failed: {message}")]
    Stream { key: String, message: String },

    #[error("Uploading archive to '{location}' failed: {message}")]
    Upload { location: String, message: String },

    #[error("Archive entry '{name}' would be written by both '{first}' and '{second}'.")]
    EntryCollision {
        name: String,
        first: String,
        second: String,
    },

    #[error("Dataset name '{name}' is shared by prefixes: {}", prefixes.join(", "))]
    DatasetCollision { name: String, prefixes: Vec<String> },

    #[error("Object key '{key}' has no entry name below dataset prefix '{prefix}'.")]
    EmptyEntryName { key: String, prefix: String },
}

/// Type alias for Result using anyhow::Error for broad compatibility.
pub type Result<T> = anyhow::Result<T>;

/// The point in a dataset's lifecycle at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Resolving the dataset list (name collisions).
    Plan,
    /// Existence probe against the destination.
    Check,
    /// Listing, reading and archiving member objects.
    Build,
    /// Transferring the finished archive.
    Upload,
}

impl Stage {
    /// Classifies an error by the first `ZipperError` found in its chain.
    /// Errors carrying no domain variant are attributed to the build stage,
    /// which is where unclassified I/O (scratch directory, writer task) lives.
    pub fn of(err: &anyhow::Error) -> Stage {
        let domain = err.chain().find_map(|e| e.downcast_ref::<ZipperError>());
        match domain {
            Some(ZipperError::DatasetCollision { .. }) => Stage::Plan,
            Some(ZipperError::Probe { .. }) => Stage::Check,
            Some(ZipperError::Upload { .. }) => Stage::Upload,
            _ => Stage::Build,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Plan => "plan",
            Stage::Check => "existence check",
            Stage::Build => "build",
            Stage::Upload => "upload",
        };
        f.write_str(label)
    }
}
