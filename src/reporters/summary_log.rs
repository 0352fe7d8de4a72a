//! Plain-text copy of the console summary

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::{ConsoleReporter, Reporter};
use crate::models::{AggregatedResults, Suite, SuiteResult};
use crate::utils::ansi::strip_ansi;
use crate::utils::files::write_file_with_dir;

/// Writes the summary table to `test-summary.log`, without escape codes
pub struct SummaryLogReporter {
    output_path: PathBuf,
    started: Mutex<Option<Instant>>,
}

impl SummaryLogReporter {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            started: Mutex::new(None),
        }
    }

    /// `test-summary.log` next to the artifacts directory
    pub fn for_artifacts_dir(artifacts_dir: &Path) -> Self {
        let parent = artifacts_dir.parent().unwrap_or(artifacts_dir);
        Self::new(parent.join("test-summary.log"))
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

#[async_trait]
impl Reporter for SummaryLogReporter {
    fn name(&self) -> &str {
        "summary-log"
    }

    fn on_start(&self, _suites: &[Suite]) {
        *self.started.lock().unwrap_or_else(|p| p.into_inner()) = Some(Instant::now());
    }

    fn on_suite_complete(&self, _suite: &Suite, _result: &SuiteResult) {}

    async fn on_complete(&self, results: &AggregatedResults) -> Result<()> {
        let started = *self.started.lock().unwrap_or_else(|p| p.into_inner());
        let total_ms = started
            .map(|start| start.elapsed().as_millis() as u64)
            .unwrap_or(results.totals.duration_ms);

        let summary = ConsoleReporter::new().no_color().format_summary(results, total_ms);
        write_file_with_dir(&self.output_path, &strip_ansi(&summary)).await?;
        info!("Summary log written to {}", self.output_path.display());
        Ok(())
    }
}
