//! # s3zipper Object Storage Interface (`common::storage`)
//!
//! File: cli/src/common/storage/mod.rs
//!
//! ## Overview
//!
//! Everything the archiver needs from a storage service, expressed as the
//! `ObjectStorage` trait:
//!
//! - delimiter-scoped listing of a prefix's immediate child "folders"
//! - recursive, lazily paged listing of every key under a prefix
//! - a metadata-only existence probe that separates "not found" from failure
//! - a streaming object read
//! - a streaming whole-file upload
//!
//! The client is constructed once in `main` and handed down as
//! `Arc<dyn ObjectStorage>`; nothing in the crate reaches for a global handle,
//! and tests substitute in-memory stores or hand-written doubles.
//!
//! ## Architecture
//!
//! - **`store`**: `ObjectStoreClient`, the implementation backed by the
//!   `object_store` crate. Each bucket name maps to its own store instance.
//! - **`connect`** (this file): builds an `ObjectStoreClient` for the
//!   configured backend (S3 / S3-compatible, or a local directory tree).
//!
use crate::common::fs::io::ensure_dir_exists;
use crate::core::config::{Backend, StorageConfig};
use crate::core::error::{Result, ZipperError};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::ClientOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use tracing::info;

pub mod store;
#[cfg(test)]
pub mod testing;

pub use store::ObjectStoreClient;

/// Separator used to infer folders from keys.
pub const DELIMITER: char = '/';

/// Body of an object opened for reading.
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// One entry of a recursive listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedObject {
    pub key: String,
    pub size: u64,
}

/// Result of a metadata-only existence probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Found { size: u64 },
    Missing,
}

/// Operations consumed from an object-storage service.
///
/// Prefixes returned by `list_common_prefixes` end with [`DELIMITER`]. Keys
/// are full object keys within the bucket.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Immediate child prefixes of `prefix`, across every listing page.
    async fn list_common_prefixes(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;

    /// Every object under `prefix`, in key order. Pages are fetched as the
    /// stream is polled.
    fn list_keys<'a>(&'a self, bucket: &'a str, prefix: &'a str)
        -> BoxStream<'a, Result<ListedObject>>;

    /// `Ok(Presence::Missing)` only for a genuine not-found answer; every
    /// other failure is `Err(ZipperError::Probe)`.
    async fn probe(&self, bucket: &str, key: &str) -> Result<Presence>;

    async fn open_read(&self, bucket: &str, key: &str) -> Result<ObjectReader>;

    /// Streams the file at `path` to `bucket`/`key`, returning bytes sent.
    async fn upload_file(&self, path: &Path, bucket: &str, key: &str) -> Result<u64>;
}

/// Builds the storage client for `buckets` using the configured backend.
///
/// For the S3 backend each bucket gets its own `AmazonS3` instance (credentials
/// from the standard `AWS_*` environment variables). For the local backend each
/// bucket is the directory `<local_root>/<bucket>`, created if missing.
pub fn connect(config: &StorageConfig, buckets: &[&str]) -> Result<Arc<dyn ObjectStorage>> {
    let mut client = ObjectStoreClient::new();
    for &bucket in buckets {
        if client.has_bucket(bucket) {
            continue;
        }
        if bucket.is_empty() {
            return Err(anyhow!(ZipperError::Config(
                "Bucket names must not be empty.".to_string()
            )));
        }
        client = match config.backend {
            Backend::S3 => client.with_bucket(bucket, s3_store(config, bucket)?),
            Backend::Local => client.with_bucket(bucket, local_store(config, bucket)?),
        };
    }
    Ok(Arc::new(client))
}

fn s3_store(config: &StorageConfig, bucket: &str) -> Result<object_store::aws::AmazonS3> {
    let options = ClientOptions::new()
        .with_connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .with_timeout(Duration::from_secs(config.request_timeout_secs))
        .with_allow_http(config.allow_http);

    let mut builder = AmazonS3Builder::from_env()
        .with_bucket_name(bucket)
        .with_client_options(options);
    if let Some(region) = &config.region {
        builder = builder.with_region(region);
    }
    if let Some(endpoint) = &config.endpoint {
        builder = builder.with_endpoint(endpoint);
    }

    let store = builder
        .build()
        .map_err(|e| ZipperError::Config(format!("Cannot configure S3 bucket '{bucket}': {e}")))?;
    info!("Configured S3 bucket '{}'", bucket);
    Ok(store)
}

fn local_store(config: &StorageConfig, bucket: &str) -> Result<LocalFileSystem> {
    let root = config.local_root.as_deref().ok_or_else(|| {
        ZipperError::Config("storage.local_root is required for the local backend.".to_string())
    })?;
    let dir = PathBuf::from(root).join(bucket);
    ensure_dir_exists(&dir)?;
    let store = LocalFileSystem::new_with_prefix(&dir)
        .with_context(|| format!("Failed to open local bucket directory {}", dir.display()))?;
    info!("Using local bucket '{}' at {}", bucket, dir.display());
    Ok(store)
}
