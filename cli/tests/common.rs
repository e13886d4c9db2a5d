//! # s3zipper CLI Integration Test Common Helpers
//!
//! File: cli/tests/common.rs
//!
//! ## Overview
//!
//! Shared helpers for the integration tests in `cli/tests/`. Tests run the
//! compiled binary against the local storage backend: each bucket is a
//! directory under a temporary root, described by a generated config file.
//!

// Different test files use different helpers.
#![allow(dead_code)]

pub use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Command for the compiled `s3zipper` binary, isolated from the caller's
/// configuration and log settings.
pub fn s3zipper_cmd() -> Command {
    let mut cmd = Command::cargo_bin("s3zipper").expect("Failed to find s3zipper binary for testing");
    cmd.env_remove("S3ZIPPER_CONFIG").env_remove("RUST_LOG");
    cmd
}

/// A temporary local "object store" plus the config file pointing at it.
pub struct LocalFixture {
    pub root: TempDir,
    pub scratch: TempDir,
    pub config_path: PathBuf,
}

impl LocalFixture {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create storage root");
        let scratch = tempfile::tempdir().expect("create scratch dir");
        let config_path = root.path().join("s3zipper.toml");
        let config = format!(
            "[storage]\nbackend = \"local\"\nlocal_root = '{}'\n\n[archive]\nscratch_dir = '{}'\n",
            root.path().display(),
            scratch.path().display()
        );
        fs::write(&config_path, config).expect("write config file");
        Self {
            root,
            scratch,
            config_path,
        }
    }

    /// Filesystem path of `key` in `bucket`.
    pub fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.path().join(bucket).join(key)
    }

    pub fn put(&self, bucket: &str, key: &str, body: &[u8]) {
        let path = self.object_path(bucket, key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create object parent dirs");
        }
        fs::write(path, body).expect("write object");
    }

    /// `s3zipper --config <fixture config> <args>`.
    pub fn cmd(&self, args: &[&str]) -> Command {
        let mut cmd = s3zipper_cmd();
        cmd.arg("--config").arg(&self.config_path).args(args);
        cmd
    }

    pub fn scratch_is_empty(&self) -> bool {
        is_empty_dir(self.scratch.path())
    }
}

fn is_empty_dir(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}
