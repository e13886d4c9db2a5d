//! # s3zipper Filesystem Utilities (`common::fs`)
//!
//! File: cli/src/common/fs/mod.rs
//!

/// Basic directory helpers (e.g., `ensure_dir_exists`).
pub mod io;
