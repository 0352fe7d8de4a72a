//! Markdown failure reports
//!
//! One file per failure under `<artifacts>/failures/<suite>/NN-<test>.md`,
//! meant to be read by people and agents triaging a red run.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use super::Reporter;
use crate::models::{AggregatedResults, FailureDetail, Suite, SuiteResult};
use crate::utils::ansi::strip_ansi;
use crate::utils::files::{ensure_dir, sanitize_filename, FAILURES_DIR};

const MAX_NAME_LEN: usize = 100;

pub struct MarkdownReporter {
    artifacts_dir: PathBuf,
}

impl MarkdownReporter {
    pub fn new(artifacts_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifacts_dir: artifacts_dir.into(),
        }
    }

    fn suite_dir(&self, suite_name: &str) -> PathBuf {
        self.artifacts_dir
            .join(FAILURES_DIR)
            .join(sanitize_filename(suite_name, MAX_NAME_LEN))
    }

    async fn write_suite(&self, suite: &SuiteResult) -> Result<()> {
        let dir = self.suite_dir(&suite.name);
        if tokio::fs::metadata(&dir).await.is_ok() {
            tokio::fs::remove_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to clear {}", dir.display()))?;
        }
        ensure_dir(&dir).await?;

        for (i, failure) in suite.failures.iter().enumerate() {
            let path = dir.join(failure_filename(i, failure));
            tokio::fs::write(&path, format_failure(failure))
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        debug!("Wrote {} failure report(s) to {}", suite.failures.len(), dir.display());
        Ok(())
    }
}

fn failure_filename(index: usize, failure: &FailureDetail) -> String {
    format!(
        "{:02}-{}.md",
        index + 1,
        sanitize_filename(&failure.test_name, MAX_NAME_LEN)
    )
}

fn fenced(lines: &mut Vec<String>, title: &str, body: &str) {
    lines.push(String::new());
    lines.push(format!("## {title}"));
    lines.push(String::new());
    lines.push("```".to_string());
    lines.push(strip_ansi(body));
    lines.push("```".to_string());
}

/// Markdown body for one failure
pub fn format_failure(failure: &FailureDetail) -> String {
    let mut lines = vec![
        "# Test Failure Report".to_string(),
        String::new(),
        format!("**Test:** {}", failure.test_name),
        format!("**File:** {}", failure.file_path),
    ];
    if let Some(duration) = failure.duration_ms {
        lines.push(format!("**Duration:** {duration}ms"));
    }
    lines.push(String::new());
    lines.push("---".to_string());

    fenced(&mut lines, "Error", &failure.error);
    if let Some(stack) = &failure.stack {
        fenced(&mut lines, "Stack Trace", stack);
    }
    if let Some(stdout) = &failure.stdout {
        fenced(&mut lines, "Stdout", stdout);
    }
    if let Some(stderr) = &failure.stderr {
        fenced(&mut lines, "Stderr", stderr);
    }

    if !failure.attachments.is_empty() {
        lines.push(String::new());
        lines.push("## Attachments".to_string());
        lines.push(String::new());
        for attachment in &failure.attachments {
            lines.push(format!("- **{}:** {}", attachment.name, attachment.path));
        }
    }

    lines.join("\n")
}

#[async_trait]
impl Reporter for MarkdownReporter {
    fn name(&self) -> &str {
        "markdown-failures"
    }

    fn on_start(&self, _suites: &[Suite]) {}

    fn on_suite_complete(&self, _suite: &Suite, _result: &SuiteResult) {}

    async fn on_complete(&self, results: &AggregatedResults) -> Result<()> {
        for suite in results.suites.iter().filter(|s| !s.failures.is_empty()) {
            self.write_suite(suite).await?;
        }
        Ok(())
    }
}
