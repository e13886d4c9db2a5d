//! # Dataset Publishing
//!
//! File: cli/src/commands/archive/publish.rs
//!
//! ## Overview
//!
//! Runs one dataset through its lifecycle:
//!
//! 1. **Check**: unless `--overwrite`, probe the destination key. An existing
//!    archive is skipped; a failed probe is an error, never "missing".
//! 2. **Build**: stream the members into a ZIP inside a private scratch
//!    directory (skipped entirely in `--dry-run`).
//! 3. **Upload**: stream the finished file to the destination key.
//!
//! The scratch directory is a `tempfile::TempDir`, so it is removed when the
//! function returns, whether the dataset succeeded, failed, or its future was
//! dropped by an interrupt.
//!
use super::config::RunConfig;
use super::enumerate::Dataset;
use super::stream::stream_dataset;
use crate::common::archive::zip::ArchiveSummary;
use crate::common::storage::{ObjectStorage, Presence};
use crate::core::error::{Result, ZipperError};
use anyhow::{anyhow, Context};
use tempfile::TempDir;
use tracing::{debug, info};

/// What happened to a dataset that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The archive already existed and `--overwrite` was not given.
    Skipped,
    /// `--dry-run`: the archive would have been built.
    Planned,
    Uploaded(ArchiveSummary),
}

pub async fn publish_dataset(
    storage: &dyn ObjectStorage,
    run: &RunConfig,
    dataset: &Dataset,
) -> Result<Outcome> {
    let key = run.archive_key(&dataset.name);
    let target = format!("{}/{}", run.dest_bucket, key);

    if !run.overwrite {
        let presence = storage
            .probe(&run.dest_bucket, &key)
            .await
            .map_err(|e| as_probe_error(e, &target))?;
        if let Presence::Found { size } = presence {
            debug!("{} exists ({} bytes)", target, size);
            println!("⏭️  Exists, skipping: {}", target);
            return Ok(Outcome::Skipped);
        }
    }

    if run.dry_run {
        println!("📝 Would zip {} → {}", dataset.name, target);
        return Ok(Outcome::Planned);
    }
    println!("📦 Zipping {} → {}", dataset.name, target);

    let scratch = scratch_dir(run, &dataset.name)?;
    let archive_path = scratch.path().join(format!("{}.zip", dataset.name));
    let summary = stream_dataset(storage, &run.bucket, &dataset.prefix, &archive_path).await?;
    let sent = storage
        .upload_file(&archive_path, &run.dest_bucket, &key)
        .await?;
    info!("Uploaded {} ({} bytes)", target, sent);
    println!(
        "✅ Uploaded: {} ({} files, {} bytes)",
        target, summary.entries, summary.archive_bytes
    );
    Ok(Outcome::Uploaded(summary))
}

/// Any failure during the existence check counts against the check stage.
fn as_probe_error(err: anyhow::Error, target: &str) -> anyhow::Error {
    match err.downcast_ref::<ZipperError>() {
        Some(ZipperError::Probe { .. }) => err,
        _ => anyhow!(ZipperError::Probe {
            location: target.to_string(),
            message: format!("{:#}", err),
        }),
    }
}

fn scratch_dir(run: &RunConfig, name: &str) -> Result<TempDir> {
    let prefix = format!("s3zipper-{}-", name);
    let mut builder = tempfile::Builder::new();
    builder.prefix(&prefix);
    let dir = match &run.scratch_dir {
        Some(parent) => builder.tempdir_in(parent),
        None => builder.tempdir(),
    };
    dir.context("Failed to create scratch directory")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::storage::testing::{memory_client, FaultyStorage};
    use crate::core::error::Stage;
    use std::io::Read;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::io::AsyncReadExt;
    use zip::ZipArchive;

    const SOURCE: &[(&str, &[u8])] = &[
        ("raw/A/x.csv", b"a,b\n1,2\n"),
        ("raw/B/y.csv", b"c\n3\n"),
    ];

    fn run(scratch: &std::path::Path) -> RunConfig {
        RunConfig {
            bucket: "data".into(),
            src_prefix: "raw/".into(),
            dest_bucket: "data".into(),
            dest_prefix: "out/".into(),
            overwrite: false,
            dry_run: false,
            jobs: 1,
            scratch_dir: Some(scratch.to_path_buf()),
        }
    }

    fn dataset(name: &str) -> Dataset {
        Dataset {
            prefix: format!("raw/{}/", name),
            name: name.into(),
        }
    }

    async fn download(storage: &dyn ObjectStorage, key: &str) -> Result<Vec<u8>> {
        let mut reader = storage.open_read("data", key).await?;
        let mut body = Vec::new();
        reader.read_to_end(&mut body).await?;
        Ok(body)
    }

    fn scratch_is_empty(dir: &std::path::Path) -> Result<bool> {
        Ok(std::fs::read_dir(dir)?.next().is_none())
    }

    #[tokio::test]
    async fn test_uploads_missing_archive_and_cleans_scratch() -> Result<()> {
        let storage = FaultyStorage::new(memory_client(&["data"], SOURCE).await);
        let scratch = tempdir()?;

        let outcome = publish_dataset(&storage, &run(scratch.path()), &dataset("A")).await?;
        assert!(matches!(outcome, Outcome::Uploaded(s) if s.entries == 1));

        let zip_bytes = download(&storage, "out/A.zip").await?;
        let mut archive = ZipArchive::new(std::io::Cursor::new(zip_bytes))?;
        let mut body = String::new();
        archive.by_name("x.csv")?.read_to_string(&mut body)?;
        assert_eq!(body, "a,b\n1,2\n");
        assert!(scratch_is_empty(scratch.path())?);
        Ok(())
    }

    #[tokio::test]
    async fn test_existing_archive_is_skipped() -> Result<()> {
        let storage = FaultyStorage::new(
            memory_client(&["data"], &[("raw/B/y.csv", b"c\n3\n"), ("out/B.zip", b"old")]).await,
        );
        let scratch = tempdir()?;

        let outcome = publish_dataset(&storage, &run(scratch.path()), &dataset("B")).await?;
        assert_eq!(outcome, Outcome::Skipped);
        assert_eq!(storage.reads.load(Ordering::SeqCst), 0);
        assert_eq!(storage.uploads.load(Ordering::SeqCst), 0);
        assert_eq!(download(&storage, "out/B.zip").await?, b"old");
        Ok(())
    }

    #[tokio::test]
    async fn test_overwrite_skips_probe_and_replaces() -> Result<()> {
        let storage = FaultyStorage::new(
            memory_client(&["data"], &[("raw/B/y.csv", b"c\n3\n"), ("out/B.zip", b"old")]).await,
        );
        let scratch = tempdir()?;
        let mut config = run(scratch.path());
        config.overwrite = true;

        let outcome = publish_dataset(&storage, &config, &dataset("B")).await?;
        assert!(matches!(outcome, Outcome::Uploaded(_)));
        assert_eq!(storage.probes.load(Ordering::SeqCst), 0);
        assert_ne!(download(&storage, "out/B.zip").await?, b"old");
        Ok(())
    }

    #[tokio::test]
    async fn test_dry_run_builds_nothing() -> Result<()> {
        let storage = FaultyStorage::new(memory_client(&["data"], SOURCE).await);
        let scratch = tempdir()?;
        let mut config = run(scratch.path());
        config.dry_run = true;

        let outcome = publish_dataset(&storage, &config, &dataset("A")).await?;
        assert_eq!(outcome, Outcome::Planned);
        assert_eq!(storage.probes.load(Ordering::SeqCst), 1);
        assert_eq!(storage.reads.load(Ordering::SeqCst), 0);
        assert_eq!(storage.uploads.load(Ordering::SeqCst), 0);
        assert!(scratch_is_empty(scratch.path())?);
        Ok(())
    }

    #[tokio::test]
    async fn test_denied_probe_is_a_check_failure() -> Result<()> {
        let mut storage = FaultyStorage::new(memory_client(&["data"], SOURCE).await);
        storage.denied_probes = vec!["out/A.zip".into()];
        let scratch = tempdir()?;

        let err = publish_dataset(&storage, &run(scratch.path()), &dataset("A"))
            .await
            .unwrap_err();
        assert_eq!(Stage::of(&err), Stage::Check);
        assert_eq!(storage.reads.load(Ordering::SeqCst), 0);
        assert_eq!(storage.uploads.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_unregistered_destination_is_a_check_failure() -> Result<()> {
        let storage = FaultyStorage::new(memory_client(&["data"], SOURCE).await);
        let scratch = tempdir()?;
        let mut config = run(scratch.path());
        config.dest_bucket = "unknown".into();

        let err = publish_dataset(&storage, &config, &dataset("A"))
            .await
            .unwrap_err();
        assert_eq!(Stage::of(&err), Stage::Check);
        Ok(())
    }

    #[tokio::test]
    async fn test_upload_failure_leaves_no_object_and_no_scratch() -> Result<()> {
        let mut storage = FaultyStorage::new(memory_client(&["data"], SOURCE).await);
        storage.fail_uploads = true;
        let scratch = tempdir()?;

        let err = publish_dataset(&storage, &run(scratch.path()), &dataset("A"))
            .await
            .unwrap_err();
        assert_eq!(Stage::of(&err), Stage::Upload);
        assert_eq!(storage.probe("data", "out/A.zip").await?, Presence::Missing);
        assert!(scratch_is_empty(scratch.path())?);
        Ok(())
    }

    #[tokio::test]
    async fn test_build_failure_uploads_nothing() -> Result<()> {
        let mut storage = FaultyStorage::new(memory_client(&["data"], SOURCE).await);
        storage.broken_reads = vec!["raw/A/x.csv".into()];
        let scratch = tempdir()?;

        let err = publish_dataset(&storage, &run(scratch.path()), &dataset("A"))
            .await
            .unwrap_err();
        assert_eq!(Stage::of(&err), Stage::Build);
        assert_eq!(storage.uploads.load(Ordering::SeqCst), 0);
        assert!(scratch_is_empty(scratch.path())?);
        Ok(())
    }

    #[tokio::test]
    async fn test_dropped_run_leaves_no_scratch_or_archive() -> Result<()> {
        let mut storage = FaultyStorage::new(memory_client(&["data"], SOURCE).await);
        // The body hands out a few bytes and then never finishes.
        storage.stalled_reads = vec!["raw/A/x.csv".into()];
        let scratch = tempdir()?;

        let interrupted = tokio::time::timeout(
            Duration::from_millis(200),
            publish_dataset(&storage, &run(scratch.path()), &dataset("A")),
        )
        .await;
        assert!(interrupted.is_err());
        assert_eq!(storage.reads.load(Ordering::SeqCst), 1);
        assert!(scratch_is_empty(scratch.path())?);
        assert_eq!(storage.uploads.load(Ordering::SeqCst), 0);
        assert_eq!(storage.probe("data", "out/A.zip").await?, Presence::Missing);
        Ok(())
    }
}
