//! Per-test timing reporters
//!
//! `timing` writes one `timing.json` with every test of the run, slowest
//! first. `timing-text` writes a `<suite>-timing.txt` per suite with the
//! slowest tests, the heaviest files and the setup/teardown overhead.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use super::Reporter;
use crate::models::{AggregatedResults, Suite, SuiteResult, TestStatus};
use crate::utils::files::{ensure_dir, sanitize_filename, write_file_with_dir};

pub const DEFAULT_TOP_TESTS: usize = 30;
pub const DEFAULT_TOP_FILES: usize = 15;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingEntry<'a> {
    pub name: &'a str,
    pub file: &'a str,
    pub suite: &'a str,
    pub duration: u64,
    pub status: TestStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingOutput<'a> {
    pub timestamp: String,
    pub total_duration: u64,
    pub tests: Vec<TimingEntry<'a>>,
}

impl<'a> TimingOutput<'a> {
    /// Every test with a timing record; ties keep suite order
    pub fn new(results: &'a AggregatedResults) -> Self {
        let mut tests: Vec<TimingEntry<'a>> = results
            .suites
            .iter()
            .flat_map(|suite| {
                suite.test_results.iter().flatten().map(move |test| TimingEntry {
                    name: &test.name,
                    file: &test.file,
                    suite: &suite.name,
                    duration: test.duration_ms,
                    status: test.status,
                })
            })
            .collect();
        tests.sort_by(|a, b| b.duration.cmp(&a.duration));

        Self {
            timestamp: Utc::now().to_rfc3339(),
            total_duration: results.totals.duration_ms,
            tests,
        }
    }
}

/// Writes `timing.json` on completion
pub struct TimingReporter {
    output_path: PathBuf,
}

impl TimingReporter {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }

    /// `timing.json` next to the artifacts directory
    pub fn for_artifacts_dir(artifacts_dir: &Path) -> Self {
        let parent = artifacts_dir.parent().unwrap_or(artifacts_dir);
        Self::new(parent.join("timing.json"))
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

#[async_trait]
impl Reporter for TimingReporter {
    fn name(&self) -> &str {
        "timing"
    }

    fn on_start(&self, _suites: &[Suite]) {}

    fn on_suite_complete(&self, _suite: &Suite, _result: &SuiteResult) {}

    async fn on_complete(&self, results: &AggregatedResults) -> Result<()> {
        let output = TimingOutput::new(results);
        let json = serde_json::to_string_pretty(&output).context("Failed to serialize timing")?;
        write_file_with_dir(&self.output_path, &json).await?;
        info!(
            "Timing for {} test(s) written to {}",
            output.tests.len(),
            self.output_path.display()
        );
        Ok(())
    }
}

/// Writes a plain-text timing breakdown per suite
pub struct TimingTextReporter {
    output_dir: PathBuf,
    top_tests: usize,
    top_files: usize,
    completed: Mutex<Vec<SuiteResult>>,
}

impl TimingTextReporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            top_tests: DEFAULT_TOP_TESTS,
            top_files: DEFAULT_TOP_FILES,
            completed: Mutex::new(Vec::new()),
        }
    }

    pub fn with_limits(mut self, top_tests: usize, top_files: usize) -> Self {
        self.top_tests = top_tests;
        self.top_files = top_files;
        self
    }

    fn file_name(suite_name: &str) -> String {
        format!("{}-timing.txt", sanitize_filename(suite_name, 100))
    }

    pub fn format_suite(&self, result: &SuiteResult) -> String {
        let mut lines = vec![
            format!("Timing Report: {}", result.name),
            format!("Total Duration: {}", short_duration(result.duration_ms)),
            String::new(),
        ];

        let tests = match result.test_results.as_deref() {
            Some(tests) if !tests.is_empty() => tests,
            _ => {
                lines.push("No individual test results available for timing analysis.".to_string());
                lines.push(String::new());
                return lines.join("\n");
            }
        };

        let mut slowest: Vec<_> = tests.iter().collect();
        slowest.sort_by(|a, b| b.duration_ms.cmp(&a.duration_ms));
        slowest.truncate(self.top_tests);

        lines.push(format!("Top {} Slowest Tests", slowest.len()));
        lines.push("─".repeat(60));
        for (i, test) in slowest.iter().enumerate() {
            lines.push(format!(
                "  {:>2}. {:>8}  {}",
                i + 1,
                short_duration(test.duration_ms),
                test.name
            ));
            if !test.file.is_empty() {
                lines.push(format!("      {}", test.file));
            }
        }
        lines.push(String::new());

        let mut by_file: BTreeMap<&str, (u64, usize)> = BTreeMap::new();
        for test in tests {
            let entry = by_file.entry(test.file.as_str()).or_default();
            entry.0 += test.duration_ms;
            entry.1 += 1;
        }
        let mut files: Vec<_> = by_file.into_iter().collect();
        files.sort_by(|a, b| b.1 .0.cmp(&a.1 .0));
        files.truncate(self.top_files);

        lines.push(format!("Top {} Files by Test Duration", files.len()));
        lines.push("─".repeat(60));
        for (i, (file, (duration, count))) in files.iter().enumerate() {
            lines.push(format!(
                "  {:>2}. {:>8}  ({} tests)  {}",
                i + 1,
                short_duration(*duration),
                count,
                file
            ));
        }
        lines.push(String::new());

        let test_time: u64 = tests.iter().map(|t| t.duration_ms).sum();
        if result.duration_ms > test_time {
            lines.push(format!(
                "Setup/Teardown Overhead: {} (suite: {}, tests: {})",
                short_duration(result.duration_ms - test_time),
                short_duration(result.duration_ms),
                short_duration(test_time)
            ));
        }
        lines.push(String::new());
        lines.join("\n")
    }
}

#[async_trait]
impl Reporter for TimingTextReporter {
    fn name(&self) -> &str {
        "timing-text"
    }

    fn on_start(&self, _suites: &[Suite]) {}

    fn on_suite_complete(&self, _suite: &Suite, result: &SuiteResult) {
        self.completed
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(result.clone());
    }

    async fn on_complete(&self, _results: &AggregatedResults) -> Result<()> {
        let completed = std::mem::take(&mut *self.completed.lock().unwrap_or_else(|p| p.into_inner()));
        ensure_dir(&self.output_dir).await?;

        for result in &completed {
            let path = self.output_dir.join(Self::file_name(&result.name));
            tokio::fs::write(&path, self.format_suite(result))
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            debug!("Timing report for {} written to {}", result.name, path.display());
        }
        Ok(())
    }
}

/// `850ms` below a second, `1.5s` above
fn short_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{ms}ms")
    } else {
        format!("{:.1}s", ms as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ParseResult, TestResult};
    use tempfile::tempdir;

    fn test(name: &str, file: &str, status: TestStatus, duration_ms: u64) -> TestResult {
        TestResult {
            name: name.to_string(),
            file: file.to_string(),
            status,
            duration_ms,
        }
    }

    fn suite(name: &str, duration_ms: u64, tests: Option<Vec<TestResult>>) -> SuiteResult {
        let mut parse = ParseResult::empty();
        parse.passed = tests.as_ref().map_or(0, |t| t.len() as u64);
        parse.duration_ms = duration_ms;
        parse.test_results = tests;
        SuiteResult::from_parse(name, parse, "x.log".into(), "x.json".into())
    }

    fn results() -> AggregatedResults {
        AggregatedResults::from_suites(vec![
            suite(
                "unit",
                400,
                Some(vec![
                    test("adds", "math.test.ts", TestStatus::Passed, 12),
                    test("divides", "math.test.ts", TestStatus::Failed, 250),
                ]),
            ),
            suite("lint", 100, None),
            suite(
                "e2e",
                9000,
                Some(vec![test("Checkout > pays", "checkout.spec.ts", TestStatus::Passed, 4200)]),
            ),
        ])
    }

    #[tokio::test]
    async fn test_timing_json_slowest_first() {
        let dir = tempdir().unwrap();
        let reporter = TimingReporter::for_artifacts_dir(&dir.path().join("results"));
        assert_eq!(reporter.output_path(), dir.path().join("timing.json"));

        reporter.on_complete(&results()).await.unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("timing.json")).unwrap())
                .unwrap();
        assert_eq!(written["totalDuration"], 9500);
        let tests = written["tests"].as_array().unwrap();
        let order: Vec<&str> = tests.iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert_eq!(order, vec!["Checkout > pays", "divides", "adds"]);
        assert_eq!(tests[0]["suite"], "e2e");
        assert_eq!(tests[1]["status"], "failed");
        assert_eq!(tests[1]["duration"], 250);
    }

    #[test]
    fn test_suite_breakdown() {
        let reporter = TimingTextReporter::new("/tmp").with_limits(1, 5);
        let text = reporter.format_suite(&results().suites[0]);

        assert!(text.starts_with("Timing Report: unit\nTotal Duration: 400ms\n"));
        assert!(text.contains("Top 1 Slowest Tests"));
        assert!(text.contains("   1.    250ms  divides\n      math.test.ts"));
        assert!(!text.contains("adds"));
        assert!(text.contains("   1.    262ms  (2 tests)  math.test.ts"));
        assert!(text.contains("Setup/Teardown Overhead: 138ms (suite: 400ms, tests: 262ms)"));
    }

    #[test]
    fn test_suite_without_test_results() {
        let reporter = TimingTextReporter::new("/tmp");
        let text = reporter.format_suite(&results().suites[1]);
        assert!(text.contains("No individual test results available"));
    }

    #[tokio::test]
    async fn test_writes_one_file_per_suite() {
        let dir = tempdir().unwrap();
        let reporter = TimingTextReporter::new(dir.path());
        let results = results();
        for result in &results.suites {
            let suite = Suite::new(&result.name, crate::models::SuiteKind::Jest, "true", "x.json");
            reporter.on_suite_complete(&suite, result);
        }
        reporter.on_complete(&results).await.unwrap();

        let e2e = std::fs::read_to_string(dir.path().join("e2e-timing.txt")).unwrap();
        assert!(e2e.contains("4.2s  Checkout > pays"));
        assert!(dir.path().join("unit-timing.txt").is_file());
        assert!(dir.path().join("lint-timing.txt").is_file());
    }
}
