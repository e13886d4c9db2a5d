//! # s3zipper Archive Utilities Module (`common::archive`)
//!
//! File: cli/src/common/archive/mod.rs
//!
//! ## Overview
//!
//! Archive writing for s3zipper. The archive format is ZIP with deflate
//! entries; building happens on local scratch disk so that only one chunk of
//! any member is ever held in memory.
//!
//! ## Architecture
//!
//! - **`zip`**: `ZipArchiveWriter` plus the blocking `write_archive` consumer
//!   that turns a channel of `ArchiveOp`s into a finished `.zip` file.
//!
//! Fetching the bytes that feed the channel is the job of
//! `commands::archive::stream`; this module knows nothing about object storage.
//!

pub mod zip;
