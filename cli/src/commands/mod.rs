//! # s3zipper Command Modules
//!
//! File: cli/src/commands/mod.rs
//!
//! ## Overview
//!
//! Command logic, separate from the shared utilities in `common` and the
//! infrastructure in `core`. s3zipper has a single command, `archive`, whose
//! arguments are flattened into the top-level CLI.
//!

/// Per-folder ZIP archiving of an object-storage prefix.
pub mod archive;
