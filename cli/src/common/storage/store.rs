//! # `object_store`-backed Storage Client (`common::storage::store`)
//!
//! File: cli/src/common/storage/store.rs
//!
//! ## Overview
//!
//! `ObjectStoreClient` implements `ObjectStorage` on top of the
//! `object_store` crate. A bucket name is resolved to a registered
//! `Arc<dyn ObjectStore>`, so the same code drives AWS S3, S3-compatible
//! services, a local directory tree, or `InMemory` in tests.
//!
//! ## Key handling
//!
//! `object_store` normalizes keys into `Path`s without leading or trailing
//! delimiters. Common prefixes are therefore re-suffixed with `/` before they
//! are returned, and a directory-marker key such as `raw/B/` is listed as
//! the zero-byte object `raw/B`. Listings carry object sizes so the
//! enumerator can recognize such markers.
//!
//! Multipart uploads use parts of at least 8 MiB, grown with the file size so
//! no upload needs more than 10,000 parts.
//!
use super::{ListedObject, ObjectReader, ObjectStorage, Presence, DELIMITER};
use crate::core::error::{Result, ZipperError};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use object_store::buffered::BufWriter;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

/// Size at which uploads switch from a single PUT to a multipart upload, and
/// the smallest part size used.
const UPLOAD_BUFFER_SIZE: usize = 8 * 1024 * 1024;

/// S3 rejects multipart uploads with more parts than this.
const MAX_UPLOAD_PARTS: u64 = 10_000;

const MIB: u64 = 1024 * 1024;

/// Storage client holding one `ObjectStore` per bucket.
#[derive(Clone, Debug, Default)]
pub struct ObjectStoreClient {
    buckets: HashMap<String, Arc<dyn ObjectStore>>,
}

impl ObjectStoreClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `store` as the backend for `bucket`.
    pub fn with_bucket(mut self, bucket: impl Into<String>, store: impl ObjectStore) -> Self {
        self.buckets.insert(bucket.into(), Arc::new(store));
        self
    }

    /// Registers an already shared store, e.g. one `InMemory` serving two
    /// bucket names.
    #[cfg(test)]
    pub fn with_shared_bucket(mut self, bucket: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        self.buckets.insert(bucket.into(), store);
        self
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.buckets.contains_key(bucket)
    }

    fn store(&self, bucket: &str) -> Result<&Arc<dyn ObjectStore>> {
        self.buckets.get(bucket).ok_or_else(|| {
            anyhow!(ZipperError::UnknownBucket {
                name: bucket.to_string()
            })
        })
    }
}

/// Parses a listing prefix. An empty (or all-delimiter) prefix lists the whole bucket.
fn prefix_path(prefix: &str) -> Result<Option<ObjectPath>> {
    if prefix.trim_matches(DELIMITER).is_empty() {
        return Ok(None);
    }
    ObjectPath::parse(prefix)
        .map(Some)
        .with_context(|| format!("Invalid prefix '{}'", prefix))
}

/// Part size for a multipart upload of `len` bytes: large enough to stay
/// within `MAX_UPLOAD_PARTS`, rounded up to whole MiB.
fn upload_part_size(len: u64) -> usize {
    let needed = len.div_ceil(MAX_UPLOAD_PARTS).div_ceil(MIB) * MIB;
    usize::try_from(needed)
        .unwrap_or(usize::MAX)
        .max(UPLOAD_BUFFER_SIZE)
}

fn key_path(key: &str) -> Result<ObjectPath> {
    ObjectPath::parse(key).with_context(|| format!("Invalid object key '{}'", key))
}

/// Only `NotFound` means absent. Denied, throttled or unreachable is an error.
fn classify_head(head: object_store::Result<u64>, bucket: &str, key: &str) -> Result<Presence> {
    match head {
        Ok(size) => Ok(Presence::Found { size }),
        Err(object_store::Error::NotFound { .. }) => Ok(Presence::Missing),
        Err(e) => {
            warn!("Existence probe for {}/{} failed: {}", bucket, key, e);
            Err(anyhow!(ZipperError::Probe {
                location: format!("{}/{}", bucket, key),
                message: e.to_string(),
            }))
        }
    }
}

#[async_trait]
impl ObjectStorage for ObjectStoreClient {
    #[tracing::instrument(name = "storage.list_common_prefixes", skip(self))]
    async fn list_common_prefixes(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let store = self.store(bucket)?;
        let prefix = prefix_path(prefix)?;
        // `list_with_delimiter` follows continuation tokens until the listing is exhausted.
        let listing = store
            .list_with_delimiter(prefix.as_ref())
            .await
            .map_err(ZipperError::from)
            .with_context(|| format!("Failed to list folders in bucket '{}'", bucket))?;
        debug!(
            "Listing returned {} common prefixes and {} objects",
            listing.common_prefixes.len(),
            listing.objects.len()
        );
        Ok(listing
            .common_prefixes
            .into_iter()
            .map(|p| format!("{}{}", p, DELIMITER))
            .collect())
    }

    fn list_keys<'a>(
        &'a self,
        bucket: &'a str,
        prefix: &'a str,
    ) -> BoxStream<'a, Result<ListedObject>> {
        let (store, prefix) = match self.store(bucket).and_then(|s| Ok((s, prefix_path(prefix)?))) {
            Ok(resolved) => resolved,
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };
        store
            .list(prefix.as_ref())
            .map_ok(|meta| ListedObject {
                key: meta.location.to_string(),
                size: meta.size as u64,
            })
            .map_err(move |e| {
                anyhow!(ZipperError::from(e)).context(format!("Failed to list keys in bucket '{}'", bucket))
            })
            .boxed()
    }

    #[tracing::instrument(name = "storage.probe", skip(self))]
    async fn probe(&self, bucket: &str, key: &str) -> Result<Presence> {
        let store = self.store(bucket)?;
        let path = key_path(key)?;
        let head = store.head(&path).await.map(|meta| meta.size as u64);
        classify_head(head, bucket, key)
    }

    #[tracing::instrument(name = "storage.open_read", skip(self))]
    async fn open_read(&self, bucket: &str, key: &str) -> Result<ObjectReader> {
        let store = self.store(bucket)?;
        let path = key_path(key)?;
        let result = store.get(&path).await.map_err(ZipperError::from)?;
        let body = result.into_stream().map_err(io::Error::other);
        Ok(Box::new(StreamReader::new(body)))
    }

    #[tracing::instrument(name = "storage.upload_file", skip(self, path))]
    async fn upload_file(&self, path: &Path, bucket: &str, key: &str) -> Result<u64> {
        let store = Arc::clone(self.store(bucket)?);
        let destination = key_path(key)?;
        let location = format!("{}/{}", bucket, key);
        let upload_error = |e: &dyn std::fmt::Display| ZipperError::Upload {
            location: location.clone(),
            message: e.to_string(),
        };

        let mut file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open archive {}", path.display()))?;
        let len = file
            .metadata()
            .await
            .with_context(|| format!("Failed to read size of archive {}", path.display()))?
            .len();
        let part_size = upload_part_size(len);
        debug!("Uploading {} bytes to {} in parts of {} bytes", len, location, part_size);
        let mut writer = BufWriter::with_capacity(store, destination, part_size);

        let sent = match tokio::io::copy(&mut file, &mut writer).await {
            Ok(sent) => sent,
            Err(e) => {
                // Abandon the multipart upload so no partial object is left behind.
                if let Err(abort_err) = writer.abort().await {
                    warn!("Failed to abort upload to {}: {}", location, abort_err);
                }
                return Err(anyhow!(upload_error(&e)));
            }
        };
        writer
            .shutdown()
            .await
            .map_err(|e| anyhow!(upload_error(&e)))?;
        debug!("Uploaded {} bytes to {}", sent, location);
        Ok(sent)
    }
}
