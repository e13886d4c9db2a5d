//! # s3zipper Core Infrastructure
//!
//! File: cli/src/core/mod.rs
//!
//! ## Overview
//!
//! Foundational pieces shared by every part of s3zipper:
//! - `config`: Configuration file loading, defaults and validation
//! - `error`: Error types and failure-stage classification
//!
//! ## Usage
//!
//! ```rust
//! use crate::core::config; // For loading configuration
//! use crate::core::error::{Result, ZipperError}; // For error handling
//! ```
//!
pub mod config;
pub mod error;
