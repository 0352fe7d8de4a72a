//! JSON summary reporter

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::Reporter;
use crate::models::{AggregatedResults, ErrorCategory, ExitCode, Suite, SuiteResult, Totals};
use crate::utils::files::write_file_with_dir;

/// Machine-readable run summary
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary<'a> {
    pub timestamp: String,
    pub success: bool,
    pub pass_rate: f64,
    pub exit_code: ExitCode,
    pub totals: &'a Totals,
    pub suites: Vec<SummaryRow<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRow<'a> {
    pub name: &'a str,
    pub passed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub duration: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
    pub result_file: &'a Path,
    pub log_file: &'a Path,
}

impl<'a> Summary<'a> {
    pub fn new(results: &'a AggregatedResults) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            success: results.success,
            pass_rate: results.pass_rate,
            exit_code: results.exit_code,
            totals: &results.totals,
            suites: results
                .suites
                .iter()
                .map(|s| SummaryRow {
                    name: &s.name,
                    passed: s.passed,
                    failed: s.failed,
                    skipped: s.skipped,
                    duration: s.duration_ms,
                    success: s.success,
                    error_category: s.error_category,
                    result_file: &s.result_file,
                    log_file: &s.log_file,
                })
                .collect(),
        }
    }
}

/// Writes `summary.json` on completion
pub struct JsonReporter {
    output_path: PathBuf,
}

impl JsonReporter {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }

    /// `summary.json` next to the artifacts directory
    pub fn for_artifacts_dir(artifacts_dir: &Path) -> Self {
        let parent = artifacts_dir.parent().unwrap_or(artifacts_dir);
        Self::new(parent.join("summary.json"))
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

#[async_trait]
impl Reporter for JsonReporter {
    fn name(&self) -> &str {
        "json"
    }

    fn on_start(&self, _suites: &[Suite]) {}

    fn on_suite_complete(&self, _suite: &Suite, _result: &SuiteResult) {}

    async fn on_complete(&self, results: &AggregatedResults) -> Result<()> {
        let json = serde_json::to_string_pretty(&Summary::new(results))
            .context("Failed to serialize summary")?;
        write_file_with_dir(&self.output_path, &json).await?;
        info!("Summary written to {}", self.output_path.display());
        Ok(())
    }
}
