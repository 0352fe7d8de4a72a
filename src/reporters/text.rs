//! Plain-text results for CI tools
//!
//! No colours and no markdown: a status block, totals and every suite with
//! the first line of each failure.

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::Reporter;
use crate::models::{AggregatedResults, Suite, SuiteResult};
use crate::utils::ansi::strip_ansi;
use crate::utils::files::write_file_with_dir;

const MAX_ERROR_LEN: usize = 100;

/// Writes `test-results.txt` on completion
pub struct TextReporter {
    output_path: PathBuf,
}

impl TextReporter {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }

    /// `test-results.txt` next to the artifacts directory
    pub fn for_artifacts_dir(artifacts_dir: &Path) -> Self {
        let parent = artifacts_dir.parent().unwrap_or(artifacts_dir);
        Self::new(parent.join("test-results.txt"))
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

fn seconds(ms: u64) -> String {
    format!("{:.1}s", ms as f64 / 1000.0)
}

pub fn format_results(results: &AggregatedResults) -> String {
    let totals = &results.totals;
    let mut lines = vec![
        "TEST RESULTS".to_string(),
        "=".repeat(50),
        String::new(),
        format!("Status: {}", if results.success { "PASSED" } else { "FAILED" }),
        format!("Pass Rate: {:.1}%", results.pass_rate),
        format!("Exit Code: {}", results.exit_code),
        String::new(),
        "Totals:".to_string(),
        format!("  Passed:  {}", totals.passed),
        format!("  Failed:  {}", totals.failed),
        format!("  Skipped: {}", totals.skipped),
        format!("  Duration: {}", seconds(totals.duration_ms)),
        String::new(),
        "Suites:".to_string(),
        "-".repeat(50),
    ];

    for suite in &results.suites {
        lines.push(format!(
            "  {}: {}",
            suite.name,
            if suite.success { "PASS" } else { "FAIL" }
        ));
        lines.push(format!(
            "    Passed: {}, Failed: {}, Skipped: {}",
            suite.passed, suite.failed, suite.skipped
        ));
        lines.push(format!("    Duration: {}", seconds(suite.duration_ms)));

        if !suite.failures.is_empty() {
            lines.push("    Failures:".to_string());
            for failure in &suite.failures {
                lines.push(format!("      - {}", failure.test_name));
                lines.push(format!("        File: {}", failure.file_path));
                let error = strip_ansi(&failure.error);
                let first: String = error.lines().next().unwrap_or("").chars().take(MAX_ERROR_LEN).collect();
                if !first.is_empty() {
                    lines.push(format!("        Error: {first}"));
                }
            }
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

#[async_trait]
impl Reporter for TextReporter {
    fn name(&self) -> &str {
        "text"
    }

    fn on_start(&self, _suites: &[Suite]) {}

    fn on_suite_complete(&self, _suite: &Suite, _result: &SuiteResult) {}

    async fn on_complete(&self, results: &AggregatedResults) -> Result<()> {
        write_file_with_dir(&self.output_path, &format_results(results)).await?;
        info!("Text results written to {}", self.output_path.display());
        Ok(())
    }
}
