//! # Dataset Streaming
//!
//! File: cli/src/commands/archive/stream.rs
//!
//! ## Overview
//!
//! Builds one dataset's archive on local disk without holding any object in
//! memory. Two tasks cooperate over a bounded channel:
//!
//! - the **producer** (this async task) walks the member keys page by page,
//!   opens each object and reads its body in chunks of at most `CHUNK_SIZE`;
//! - the **writer** (`common::archive::zip::write_archive` on the blocking
//!   pool) deflates the chunks into the ZIP file.
//!
//! With a channel depth of `CHANNEL_DEPTH`, at most that many chunks plus the
//! one being read and the one being compressed are alive at any time.
//!
//! Entry names are keys with the dataset prefix removed. Two keys mapping to
//! the same entry name abort the dataset instead of producing an archive with
//! duplicate entries.
//!
//! A zero-byte member is checked with a metadata request before it is added.
//! If the key does not exist it was a normalized marker of an empty folder and
//! is skipped; otherwise it is a real empty file and becomes an empty entry
//! without a GET.
//!
use super::enumerate::{entry_name, list_members};
use crate::common::archive::zip::{
    write_archive, ArchiveOp, ArchiveSummary, CHANNEL_DEPTH, CHUNK_SIZE,
};
use crate::common::storage::{ObjectStorage, Presence};
use crate::core::error::{Result, ZipperError};
use anyhow::{anyhow, Context};
use bytes::Bytes;
use futures_util::TryStreamExt;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Why the producer stopped early.
enum FeedError {
    /// The writer hung up; its own result explains why.
    WriterClosed { key: String },
    Failed(anyhow::Error),
}

impl From<anyhow::Error> for FeedError {
    fn from(err: anyhow::Error) -> Self {
        FeedError::Failed(err)
    }
}

/// Streams every member of `dataset_prefix` in `bucket` into a new ZIP file
/// at `archive_path`. The file is complete only when this returns `Ok`.
pub async fn stream_dataset(
    storage: &dyn ObjectStorage,
    bucket: &str,
    dataset_prefix: &str,
    archive_path: &Path,
) -> Result<ArchiveSummary> {
    let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
    let path = archive_path.to_path_buf();
    let writer = tokio::task::spawn_blocking(move || write_archive(&path, rx));

    let fed = feed_archive(storage, bucket, dataset_prefix, &tx).await;
    drop(tx);
    let written = writer.await.context("Archive writer task failed")?;

    match (fed, written) {
        (Ok(members), Ok(summary)) => {
            info!(
                "Archived {} members of {} ({} bytes -> {} bytes)",
                members, dataset_prefix, summary.uncompressed_bytes, summary.archive_bytes
            );
            Ok(summary)
        }
        (Err(FeedError::Failed(e)), _) => Err(e),
        (Err(FeedError::WriterClosed { key }), Err(e)) => Err(anyhow!(ZipperError::Stream {
            key,
            message: format!("{:#}", e),
        })),
        (Err(FeedError::WriterClosed { key }), Ok(_)) => Err(anyhow!(ZipperError::Stream {
            key,
            message: "archive writer stopped before the dataset was complete".to_string(),
        })),
        (Ok(_), Err(e)) => Err(e.context(format!(
            "Failed to finish archive {}",
            archive_path.display()
        ))),
    }
}

/// Producer side: sends every member as `Entry` + `Data`*, then `Finish`.
async fn feed_archive(
    storage: &dyn ObjectStorage,
    bucket: &str,
    dataset_prefix: &str,
    tx: &mpsc::Sender<ArchiveOp>,
) -> std::result::Result<usize, FeedError> {
    let mut members = list_members(storage, bucket, dataset_prefix);
    // Entry name -> key that claimed it.
    let mut claimed: HashMap<String, String> = HashMap::new();

    while let Some(member) = members
        .try_next()
        .await
        .with_context(|| format!("Failed to list members of {}/{}", bucket, dataset_prefix))?
    {
        let key = member.key;
        if member.size == 0 {
            let presence = storage
                .probe(bucket, &key)
                .await
                .map_err(|e| stream_error(&key, e))?;
            if presence == Presence::Missing {
                debug!("Skipping empty folder marker '{}'", key);
                continue;
            }
        }

        let name = entry_name(dataset_prefix, &key)?.to_string();
        if let Some(first) = claimed.get(&name) {
            return Err(FeedError::Failed(anyhow!(ZipperError::EntryCollision {
                name,
                first: first.clone(),
                second: key,
            })));
        }

        send(tx, ArchiveOp::Entry(name.clone()), &key).await?;
        if member.size == 0 {
            debug!("Added empty file {} as '{}'", key, name);
            claimed.insert(name, key);
            continue;
        }
        let mut reader = storage
            .open_read(bucket, &key)
            .await
            .map_err(|e| stream_error(&key, e))?;
        let mut copied = 0u64;
        loop {
            let chunk = read_chunk(&mut reader, CHUNK_SIZE)
                .await
                .map_err(|e| stream_error(&key, e.into()))?;
            if chunk.is_empty() {
                break;
            }
            copied += chunk.len() as u64;
            send(tx, ArchiveOp::Data(chunk), &key).await?;
        }
        debug!("Streamed {} ({} bytes) as '{}'", key, copied, name);
        claimed.insert(name, key);
    }

    send(tx, ArchiveOp::Finish, dataset_prefix).await?;
    Ok(claimed.len())
}

async fn send(
    tx: &mpsc::Sender<ArchiveOp>,
    op: ArchiveOp,
    key: &str,
) -> std::result::Result<(), FeedError> {
    tx.send(op).await.map_err(|_| FeedError::WriterClosed {
        key: key.to_string(),
    })
}

fn stream_error(key: &str, err: anyhow::Error) -> FeedError {
    FeedError::Failed(anyhow!(ZipperError::Stream {
        key: key.to_string(),
        message: format!("{:#}", err),
    }))
}

/// Reads up to `limit` bytes, fewer only at end of body. Empty means EOF.
pub(crate) async fn read_chunk<R>(reader: &mut R, limit: usize) -> io::Result<Bytes>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = vec![0u8; limit];
    let mut filled = 0;
    while filled < limit {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(Bytes::from(buf))
}
