//! # s3zipper Common Utilities (`common`)
//!
//! File: cli/src/common/mod.rs
//!
//! ## Overview
//!
//! Shared building blocks used by the `archive` command, kept apart from the
//! command logic (`commands::`) and core infrastructure (`core::`).
//!
//! - **`archive`**: ZIP writing on local scratch disk.
//! - **`fs`**: Directory helpers.
//! - **`storage`**: The `ObjectStorage` trait and its `object_store`-backed client.
//!

/// ZIP archive writer and the blocking channel consumer that drives it.
pub mod archive;
/// Filesystem helpers (`ensure_dir_exists`).
pub mod fs;
/// Object-storage interface, backends and client construction.
pub mod storage;
