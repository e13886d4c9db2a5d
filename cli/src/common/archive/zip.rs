//! # s3zipper ZIP Archive Writer (`common::archive::zip`)
//!
//! File: cli/src/common/archive/zip.rs
//!
//! ## Overview
//!
//! Writes a deflate-compressed ZIP file on local disk from a sequence of
//! `ArchiveOp`s. The writer never sees a whole object: it receives entry names
//! and chunks (at most `CHUNK_SIZE` bytes each) and compresses them as they
//! arrive, so its memory use is one chunk plus the `zip` crate's deflate state.
//!
//! ## Architecture
//!
//! - `ZipArchiveWriter` wraps `zip::ZipWriter` with the archive policy:
//!   deflate at level 6, zip64 headers so members larger than 4 GiB are legal,
//!   and bookkeeping for the run summary.
//! - `write_archive` is the consumer side of the streaming pipeline. It runs on
//!   tokio's blocking pool (`spawn_blocking`) and drains a bounded
//!   `tokio::sync::mpsc` channel fed by the async network side.
//!
//! The channel protocol is `Entry(name)`, any number of `Data(chunk)`, repeated,
//! then exactly one `Finish`. A channel that closes without `Finish` means the
//! producer gave up; the partial file is reported as an error and must not be
//! uploaded.
//!
//! ## Usage
//!
//! ```rust
//! let (tx, rx) = tokio::sync::mpsc::channel(CHANNEL_DEPTH);
//! let writer = tokio::task::spawn_blocking(move || write_archive(&path, rx));
//! tx.send(ArchiveOp::Entry("x.csv".into())).await?;
//! tx.send(ArchiveOp::Data(chunk)).await?;
//! tx.send(ArchiveOp::Finish).await?;
//! let summary = writer.await??;
//! ```
//!
use crate::core::error::{Result, ZipperError};
use anyhow::Context;
use bytes::Bytes;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tokio::sync::mpsc;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Size of the chunks copied from an object body into an entry (1 MiB).
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Deflate level: a throughput/ratio balance, not maximum compression.
pub const COMPRESSION_LEVEL: i64 = 6;

/// Chunks that may wait in the channel between the reader and the writer.
pub const CHANNEL_DEPTH: usize = 2;

/// One step of the archive-building protocol.
#[derive(Debug)]
pub enum ArchiveOp {
    /// Close the current entry (if any) and open a new one with this name.
    Entry(String),
    /// Append bytes to the open entry.
    Data(Bytes),
    /// Close the last entry and write the central directory.
    Finish,
}

/// Totals for a completed archive.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub entries: usize,
    /// Sum of member sizes before compression.
    pub uncompressed_bytes: u64,
    /// Size of the finished ZIP file on disk.
    pub archive_bytes: u64,
}

/// A ZIP file under construction on local disk.
pub struct ZipArchiveWriter {
    zip: ZipWriter<BufWriter<File>>,
    options: SimpleFileOptions,
    summary: ArchiveSummary,
    entry_open: bool,
}

impl ZipArchiveWriter {
    /// Creates (or truncates) the archive file at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create archive file {}", path.display()))?;
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(COMPRESSION_LEVEL))
            .large_file(true)
            .unix_permissions(0o644);
        Ok(Self {
            zip: ZipWriter::new(BufWriter::new(file)),
            options,
            summary: ArchiveSummary::default(),
            entry_open: false,
        })
    }

    /// Starts a new entry. The previous entry's CRC and sizes are finalized first.
    pub fn start_entry(&mut self, name: &str) -> Result<()> {
        self.zip
            .start_file(name, self.options)
            .with_context(|| format!("Failed to start archive entry '{}'", name))?;
        self.entry_open = true;
        self.summary.entries += 1;
        debug!("Opened archive entry '{}'", name);
        Ok(())
    }

    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        if !self.entry_open {
            anyhow::bail!(ZipperError::FileSystem(
                "Received entry data before any entry was opened.".to_string()
            ));
        }
        self.zip
            .write_all(chunk)
            .context("Failed to write data into archive entry")?;
        self.summary.uncompressed_bytes += chunk.len() as u64;
        Ok(())
    }

    /// Writes the central directory and flushes the file to disk.
    pub fn finish(self) -> Result<ArchiveSummary> {
        let mut summary = self.summary;
        let mut inner = self.zip.finish().context("Failed to finalize ZIP archive")?;
        inner.flush().context("Failed to flush ZIP archive")?;
        let file = inner
            .into_inner()
            .map_err(|e| e.into_error())
            .context("Failed to flush ZIP archive")?;
        summary.archive_bytes = file
            .metadata()
            .context("Failed to read finished archive size")?
            .len();
        Ok(summary)
    }
}

/// Drains `ops` into a new archive at `path`. Blocking: call it from
/// `tokio::task::spawn_blocking`, never directly on an async worker.
pub fn write_archive(path: &Path, mut ops: mpsc::Receiver<ArchiveOp>) -> Result<ArchiveSummary> {
    let mut writer = ZipArchiveWriter::create(path)?;
    while let Some(op) = ops.blocking_recv() {
        match op {
            ArchiveOp::Entry(name) => writer.start_entry(&name)?,
            ArchiveOp::Data(chunk) => writer.write_chunk(&chunk)?,
            ArchiveOp::Finish => return writer.finish(),
        }
    }
    anyhow::bail!(ZipperError::FileSystem(format!(
        "Archive input ended before completion; discarding partial archive {}",
        path.display()
    )))
}
