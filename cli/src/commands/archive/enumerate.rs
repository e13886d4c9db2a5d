//! # Dataset Enumeration
//!
//! File: cli/src/commands/archive/enumerate.rs
//!
//! ## Overview
//!
//! Discovers the dataset folders under the source prefix and the member
//! objects of one dataset. Folders are inferred from the `/` delimiter; a
//! dataset's name is the last non-empty segment of its prefix.
//!
//! Zero-byte "directory marker" keys (`raw/A/sub/`, or the dataset prefix
//! itself) are never members. `object_store` strips trailing delimiters, so on
//! S3 the marker `raw/A/sub/` is listed as a zero-byte `raw/A/sub`. Listings
//! are in key order, and a marker sorts directly before the keys inside its
//! folder, so a zero-byte entry whose key is a folder of the *next* listed key
//! is dropped here. A marker of an empty folder has no such successor; the
//! streamer recognizes it because the normalized key does not exist.
//!
use crate::common::storage::{ListedObject, ObjectStorage, DELIMITER};
use crate::core::error::{Result, ZipperError};
use anyhow::{anyhow, Context};
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// One immediate child folder of the source prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    /// Full prefix, ending with the delimiter (e.g. `raw/A/`).
    pub prefix: String,
    /// Last non-empty segment of `prefix`, used as the archive file stem.
    pub name: String,
}

/// A dataset name claimed by more than one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameConflict {
    pub name: String,
    pub prefixes: Vec<String>,
}

impl From<NameConflict> for ZipperError {
    fn from(conflict: NameConflict) -> Self {
        ZipperError::DatasetCollision {
            name: conflict.name,
            prefixes: conflict.prefixes,
        }
    }
}

/// Datasets to process plus the folders rejected at planning time.
#[derive(Debug, Default)]
pub struct DatasetPlan {
    pub datasets: Vec<Dataset>,
    /// Every dataset sharing a conflicting name is excluded.
    pub rejected: Vec<NameConflict>,
}

/// Last non-empty `/`-separated segment of `prefix`.
pub fn dataset_name(prefix: &str) -> Option<&str> {
    prefix.split(DELIMITER).rev().find(|segment| !segment.is_empty())
}

/// Immediate child prefixes of `src_prefix`, sorted and deduplicated.
pub async fn list_dataset_prefixes(
    storage: &dyn ObjectStorage,
    bucket: &str,
    src_prefix: &str,
) -> Result<Vec<String>> {
    let mut prefixes = storage
        .list_common_prefixes(bucket, src_prefix)
        .await
        .with_context(|| format!("Failed to list dataset folders under {}/{}", bucket, src_prefix))?;
    prefixes.sort();
    prefixes.dedup();
    debug!("Found dataset prefixes: {:?}", prefixes);
    Ok(prefixes)
}

/// Groups prefixes into datasets, rejecting names claimed by more than one prefix.
pub fn plan_datasets(prefixes: Vec<String>) -> DatasetPlan {
    let mut by_name: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for prefix in prefixes {
        match dataset_name(&prefix) {
            Some(name) => by_name.entry(name.to_string()).or_default().push(prefix),
            None => warn!("Ignoring folder '{}' with no usable name", prefix),
        }
    }

    let mut plan = DatasetPlan::default();
    for (name, mut prefixes) in by_name {
        if prefixes.len() == 1 {
            if let Some(prefix) = prefixes.pop() {
                plan.datasets.push(Dataset { prefix, name });
            }
        } else {
            plan.rejected.push(NameConflict { name, prefixes });
        }
    }
    plan.datasets.sort_by(|a, b| a.prefix.cmp(&b.prefix));
    plan
}

/// True for folder placeholder keys that must not become archive entries.
pub fn is_directory_marker(dataset_prefix: &str, key: &str) -> bool {
    key.ends_with(DELIMITER) || key == dataset_prefix.trim_end_matches(DELIMITER)
}

/// True when `candidate` is a zero-byte entry naming a folder that `next` lies in.
fn is_folder_of(candidate: &ListedObject, next: &ListedObject) -> bool {
    candidate.size == 0
        && next
            .key
            .strip_prefix(candidate.key.as_str())
            .is_some_and(|rest| rest.starts_with(DELIMITER))
}

struct MemberScan<'a> {
    listing: BoxStream<'a, Result<ListedObject>>,
    dataset_prefix: &'a str,
    /// Last listed object, held until its successor shows whether it is a marker.
    held: Option<ListedObject>,
    exhausted: bool,
}

/// Every member object of the dataset, markers removed, fetched page by page.
pub fn list_members<'a>(
    storage: &'a dyn ObjectStorage,
    bucket: &'a str,
    dataset_prefix: &'a str,
) -> BoxStream<'a, Result<ListedObject>> {
    let scan = MemberScan {
        listing: storage.list_keys(bucket, dataset_prefix),
        dataset_prefix,
        held: None,
        exhausted: false,
    };
    stream::unfold(scan, |mut scan| async move {
        loop {
            if scan.exhausted {
                return scan.held.take().map(|last| (Ok(last), scan));
            }
            match scan.listing.try_next().await {
                Err(e) => {
                    scan.exhausted = true;
                    scan.held = None;
                    return Some((Err(e), scan));
                }
                Ok(None) => scan.exhausted = true,
                Ok(Some(object)) => {
                    if is_directory_marker(scan.dataset_prefix, &object.key) {
                        continue;
                    }
                    let Some(previous) = scan.held.replace(object) else {
                        continue;
                    };
                    if scan.held.as_ref().is_some_and(|next| is_folder_of(&previous, next)) {
                        debug!("Skipping folder marker '{}'", previous.key);
                    } else {
                        return Some((Ok(previous), scan));
                    }
                }
            }
        }
    })
    .boxed()
}

/// Entry name of `key` inside the dataset's archive: the key minus the prefix.
pub fn entry_name<'k>(dataset_prefix: &str, key: &'k str) -> Result<&'k str> {
    match key.strip_prefix(dataset_prefix) {
        Some(rest) if !rest.is_empty() => Ok(rest),
        _ => Err(anyhow!(ZipperError::EmptyEntryName {
            key: key.to_string(),
            prefix: dataset_prefix.to_string(),
        })),
    }
}
