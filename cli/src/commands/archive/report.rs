//! Per-run tally of dataset outcomes and the failure lines printed for them.
use super::enumerate::NameConflict;
use super::publish::Outcome;
use crate::core::error::{Result, Stage, ZipperError};
use tracing::error;

/// One dataset that did not complete.
#[derive(Debug)]
pub struct DatasetFailure {
    pub dataset: String,
    pub stage: Stage,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub uploaded: usize,
    pub skipped: usize,
    pub planned: usize,
    pub failures: Vec<DatasetFailure>,
}

impl RunReport {
    pub fn record(&mut self, dataset: &str, result: Result<Outcome>) {
        match result {
            Ok(Outcome::Uploaded(_)) => self.uploaded += 1,
            Ok(Outcome::Skipped) => self.skipped += 1,
            Ok(Outcome::Planned) => self.planned += 1,
            Err(e) => self.fail(dataset, Stage::of(&e), format!("{:#}", e)),
        }
    }

    /// Records a dataset rejected before processing.
    pub fn reject(&mut self, conflict: NameConflict) {
        let dataset = conflict.name.clone();
        self.fail(&dataset, Stage::Plan, ZipperError::from(conflict).to_string());
    }

    fn fail(&mut self, dataset: &str, stage: Stage, message: String) {
        error!("Dataset {} failed during {}: {}", dataset, stage, message);
        eprintln!("❌ Failed {} during {}: {}", dataset, stage, message);
        self.failures.push(DatasetFailure {
            dataset: dataset.to_string(),
            stage,
            message,
        });
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "Done: {} uploaded, {} skipped, {} failed",
            self.uploaded,
            self.skipped,
            self.failures.len()
        );
        if self.planned > 0 {
            line.push_str(&format!(", {} planned (dry run)", self.planned));
        }
        line
    }
}
