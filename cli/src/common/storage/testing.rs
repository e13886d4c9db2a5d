//! Test doubles for `ObjectStorage`.
//!
//! `FaultyStorage` wraps an `ObjectStoreClient` over `InMemory` stores and
//! injects the failures that real services produce but in-memory stores
//! cannot: denied probes, bodies that break or stall mid-read, failing
//! uploads, and listings shaped like S3's (zero-byte folder markers).
use super::{ListedObject, ObjectReader, ObjectStorage, ObjectStoreClient, Presence};
use crate::core::error::{Result, ZipperError};
use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::io::StreamReader;

/// Buckets backed by a single shared `InMemory` store.
pub async fn memory_client(buckets: &[&str], objects: &[(&str, &[u8])]) -> ObjectStoreClient {
    let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
    for (key, body) in objects {
        store
            .put(
                &ObjectPath::from(*key),
                PutPayload::from(Bytes::copy_from_slice(body)),
            )
            .await
            .expect("in-memory put");
    }
    buckets.iter().fold(ObjectStoreClient::new(), |client, bucket| {
        client.with_shared_bucket(*bucket, Arc::clone(&store))
    })
}

pub fn listed(key: &str, size: u64) -> ListedObject {
    ListedObject {
        key: key.to_string(),
        size,
    }
}

#[derive(Default)]
pub struct FaultyStorage {
    pub inner: ObjectStoreClient,
    /// Keys whose probe fails with an access-denied style error.
    pub denied_probes: Vec<String>,
    /// Keys whose body yields a few bytes and then a transport error.
    pub broken_reads: Vec<String>,
    /// Keys whose body yields a few bytes and then never completes.
    pub stalled_reads: Vec<String>,
    pub fail_uploads: bool,
    /// Replaces the key listing; entries are still filtered by prefix.
    pub listing: Option<Vec<ListedObject>>,
    pub probes: AtomicUsize,
    pub reads: AtomicUsize,
    pub uploads: AtomicUsize,
}

impl FaultyStorage {
    pub fn new(inner: ObjectStoreClient) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }
}

#[async_trait]
impl ObjectStorage for FaultyStorage {
    async fn list_common_prefixes(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        self.inner.list_common_prefixes(bucket, prefix).await
    }

    fn list_keys<'a>(
        &'a self,
        bucket: &'a str,
        prefix: &'a str,
    ) -> BoxStream<'a, Result<ListedObject>> {
        match &self.listing {
            Some(objects) => stream::iter(
                objects
                    .iter()
                    .filter(move |o| o.key.starts_with(prefix))
                    .cloned()
                    .map(Ok),
            )
            .boxed(),
            None => self.inner.list_keys(bucket, prefix),
        }
    }

    async fn probe(&self, bucket: &str, key: &str) -> Result<Presence> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.denied_probes.iter().any(|k| k == key) {
            return Err(anyhow!(ZipperError::Probe {
                location: format!("{}/{}", bucket, key),
                message: "403 Forbidden".to_string(),
            }));
        }
        self.inner.probe(bucket, key).await
    }

    async fn open_read(&self, bucket: &str, key: &str) -> Result<ObjectReader> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.broken_reads.iter().any(|k| k == key) {
            let body = stream::iter(vec![
                Ok(Bytes::from_static(b"partial")),
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset")),
            ]);
            return Ok(Box::new(StreamReader::new(body)));
        }
        if self.stalled_reads.iter().any(|k| k == key) {
            let body = stream::iter(vec![Ok(Bytes::from_static(b"partial"))])
                .chain(stream::pending::<io::Result<Bytes>>());
            return Ok(Box::new(StreamReader::new(body)));
        }
        self.inner.open_read(bucket, key).await
    }

    async fn upload_file(&self, path: &Path, bucket: &str, key: &str) -> Result<u64> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if self.fail_uploads {
            return Err(anyhow!(ZipperError::Upload {
                location: format!("{}/{}", bucket, key),
                message: "503 Service Unavailable".to_string(),
            }));
        }
        self.inner.upload_file(path, bucket, key).await
    }
}
