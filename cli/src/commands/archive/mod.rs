//! # s3zipper Archive Command
//!
//! File: cli/src/commands/archive/mod.rs
//!
//! ## Overview
//!
//! Archives every immediate child folder ("dataset") of a source prefix into
//! its own ZIP file at `<dest-prefix>/<dataset>.zip`. Existing archives are
//! skipped unless `--overwrite` is given; `--dry-run` only reports.
//!
//! ## Architecture
//!
//! - `config.rs`: Command-line arguments and the resolved `RunConfig`
//! - `enumerate.rs`: Dataset discovery, naming and member listing
//! - `stream.rs`: Streaming members into a ZIP on scratch disk
//! - `publish.rs`: The check / build / upload lifecycle of one dataset
//! - `report.rs`: Outcome tally and failure reporting
//!
//! A failing dataset never stops the run. Its failure is printed with the
//! stage it reached, the remaining datasets are processed, and the report
//! marks the run as failed.
//!
//! ## Examples
//!
//! ```bash
//! s3zipper --bucket my-bucket \
//!     --src-prefix raw_data/public/ \
//!     --dest-prefix raw_data/public_zipped/
//!
//! # Preview only
//! s3zipper --bucket my-bucket --src-prefix raw/ --dest-prefix zipped/ --dry-run
//! ```
//!
use crate::common::storage::ObjectStorage;
use crate::core::error::Result;
use futures_util::StreamExt;
use std::sync::Arc;
use tracing::info;

pub use config::{ArchiveArgs, RunConfig};
pub use report::RunReport;

pub mod config;
pub mod enumerate;
pub mod publish;
pub mod report;
pub mod stream;

/// # Handle Archive Command (`handle_archive`)
///
/// Lists the datasets under `run.src_prefix`, then publishes each of them with
/// at most `run.jobs` in flight. Returns the run report; only a failure to list
/// the datasets at all is returned as `Err`.
pub async fn handle_archive(run: &RunConfig, storage: Arc<dyn ObjectStorage>) -> Result<RunReport> {
    let mut report = RunReport::default();
    let prefixes =
        enumerate::list_dataset_prefixes(storage.as_ref(), &run.bucket, &run.src_prefix).await?;
    if prefixes.is_empty() {
        println!("No dataset folders found (check prefix).");
        return Ok(report);
    }
    println!(
        "Found {} dataset folders under {}/{}",
        prefixes.len(),
        run.bucket,
        run.src_prefix
    );

    let plan = enumerate::plan_datasets(prefixes);
    for rejected in plan.rejected {
        report.reject(rejected);
    }

    let storage = storage.as_ref();
    let mut results = futures_util::stream::iter(plan.datasets)
        .map(|dataset| async move {
            let result = publish::publish_dataset(storage, run, &dataset).await;
            (dataset, result)
        })
        .buffer_unordered(run.jobs);
    while let Some((dataset, result)) = results.next().await {
        report.record(&dataset.name, result);
    }

    let summary = report.summary_line();
    info!("{}", summary);
    println!("{}", summary);
    Ok(report)
}
