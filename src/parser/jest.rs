//! Jest `--json` report parser

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{corrupted_artifact, missing_artifact, read_artifact, Artifact, Parser, ParserError};
use crate::models::{FailureDetail, ParseResult, TestResult, TestStatus};

/// Name of the failure recorded for a test file that failed to run
pub const SUITE_CRASH_NAME: &str = "Test Suite Crash";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JestReport {
    #[serde(default)]
    num_passed_tests: u64,
    #[serde(default)]
    num_failed_tests: u64,
    #[serde(default)]
    num_pending_tests: u64,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    test_results: Vec<JestFileResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JestFileResult {
    name: String,
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    assertion_results: Vec<JestAssertion>,
    #[serde(default)]
    start_time: f64,
    #[serde(default)]
    end_time: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JestAssertion {
    #[serde(default)]
    ancestor_titles: Vec<String>,
    title: String,
    status: String,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    failure_messages: Vec<String>,
}

impl JestAssertion {
    fn full_name(&self) -> String {
        let mut parts: Vec<&str> = self.ancestor_titles.iter().map(String::as_str).collect();
        parts.push(&self.title);
        parts.join(" > ")
    }

    fn status(&self) -> TestStatus {
        match self.status.as_str() {
            "passed" => TestStatus::Passed,
            "failed" => TestStatus::Failed,
            _ => TestStatus::Skipped,
        }
    }
}

/// Parser for Jest's flat list of file results
#[derive(Clone, Copy, Debug, Default)]
pub struct JestParser;

#[async_trait]
impl Parser for JestParser {
    async fn parse(
        &self,
        result_file: &Path,
        log_file: Option<&Path>,
    ) -> Result<ParseResult, ParserError> {
        let content = match read_artifact(result_file).await? {
            Artifact::Missing => return Ok(missing_artifact(log_file).await),
            // Jest writes the report in one go; an empty file means it was cut short.
            Artifact::Empty => {
                return Ok(corrupted_artifact(result_file, log_file, "empty file".to_string()).await)
            }
            Artifact::Content(content) => content,
        };

        let report: JestReport = match serde_json::from_str(&content) {
            Ok(report) => report,
            Err(e) => {
                debug!("Unparseable Jest report {}: {}", result_file.display(), e);
                return Ok(corrupted_artifact(result_file, log_file, e.to_string()).await);
            }
        };

        Ok(summarize(report))
    }
}

fn summarize(report: JestReport) -> ParseResult {
    let mut failures = Vec::new();
    let mut test_results = Vec::new();
    let mut duration_ms = 0u64;
    let mut crashed = 0u64;

    for file in &report.test_results {
        duration_ms += (file.end_time - file.start_time).max(0.0) as u64;

        if file.status == "failed" && file.assertion_results.is_empty() {
            crashed += 1;
            let message = if file.message.is_empty() {
                "Test suite failed to run".to_string()
            } else {
                file.message.clone()
            };
            failures.push(FailureDetail::new(SUITE_CRASH_NAME, &file.name, message));
            continue;
        }

        for assertion in &file.assertion_results {
            let name = assertion.full_name();
            let status = assertion.status();
            let duration = assertion.duration.unwrap_or(0.0).max(0.0) as u64;

            test_results.push(TestResult {
                name: name.clone(),
                file: file.name.clone(),
                status,
                duration_ms: duration,
            });

            if status == TestStatus::Failed {
                let mut failure =
                    FailureDetail::new(name, &file.name, assertion.failure_messages.join("\n\n"));
                if let Some(d) = assertion.duration {
                    failure = failure.with_duration(d.max(0.0) as u64);
                }
                failures.push(failure);
            }
        }
    }

    ParseResult {
        passed: report.num_passed_tests,
        failed: report.num_failed_tests + crashed,
        skipped: report.num_pending_tests,
        duration_ms,
        success: report.success && crashed == 0,
        failures,
        test_results: Some(test_results),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::crash::FRAMEWORK_CRASH_NAME;
    use crate::parser::PARSE_ERROR_NAME;
    use tempfile::tempdir;

    fn passing_report() -> String {
        let assertions = (1..=5)
            .map(|i| {
                format!(
                    r#"{{"ancestorTitles":["Math","add"],"title":"case {i}","status":"passed","duration":{i},"failureMessages":[]}}"#
                )
            })
            .collect::<Vec<_>>()
            .join(",");
        format!(
            r#"{{"numPassedTests":5,"numFailedTests":0,"numPendingTests":0,"numTotalTests":5,"success":true,
            "testResults":[{{"name":"/repo/math.test.ts","status":"passed","message":"","startTime":1000,"endTime":1250,
            "assertionResults":[{assertions}]}}]}}"#
        )
    }

    async fn parse_str(content: Option<&str>, log: Option<&str>) -> ParseResult {
        let dir = tempdir().unwrap();
        let result = dir.path().join("unit.json");
        let log_path = dir.path().join("unit.log");
        if let Some(content) = content {
            std::fs::write(&result, content).unwrap();
        }
        if let Some(log) = log {
            std::fs::write(&log_path, log).unwrap();
        }
        JestParser.parse(&result, Some(&log_path)).await.unwrap()
    }

    #[tokio::test]
    async fn test_passing_report() {
        let parsed = parse_str(Some(&passing_report()), None).await;
        assert_eq!(parsed.passed, 5);
        assert_eq!(parsed.failed, 0);
        assert_eq!(parsed.skipped, 0);
        assert!(parsed.success);
        assert_eq!(parsed.duration_ms, 250);

        let results = parsed.test_results.unwrap();
        assert_eq!(results.len(), 5);
        assert_eq!(results[0].name, "Math > add > case 1");
        assert_eq!(results[4].duration_ms, 5);
    }

    #[tokio::test]
    async fn test_failures_and_crashed_file() {
        let report = r#"{"numPassedTests":1,"numFailedTests":1,"numPendingTests":1,"success":false,
            "testResults":[
              {"name":"a.test.ts","status":"failed","message":"","startTime":0,"endTime":10,"assertionResults":[
                {"ancestorTitles":["A"],"title":"ok","status":"passed","duration":2,"failureMessages":[]},
                {"ancestorTitles":["A"],"title":"bad","status":"failed","duration":3,"failureMessages":["expected 1","got 2"]},
                {"ancestorTitles":[],"title":"later","status":"pending","duration":null,"failureMessages":[]}
              ]},
              {"name":"b.test.ts","status":"failed","message":"Cannot find module 'x'","startTime":0,"endTime":5,"assertionResults":[]}
            ]}"#;
        let parsed = parse_str(Some(report), None).await;

        assert_eq!(parsed.failed, 2);
        assert_eq!(parsed.skipped, 1);
        assert!(!parsed.success);
        assert_eq!(parsed.failures.len(), 2);
        assert_eq!(parsed.failures[0].test_name, "A > bad");
        assert_eq!(parsed.failures[0].error, "expected 1\n\ngot 2");
        assert_eq!(parsed.failures[0].duration_ms, Some(3));
        assert_eq!(parsed.failures[1].test_name, SUITE_CRASH_NAME);
        assert_eq!(parsed.failures[1].error, "Cannot find module 'x'");

        let results = parsed.test_results.unwrap();
        assert_eq!(results[2].status, TestStatus::Skipped);
        assert_eq!(results[2].name, "later");
    }

    #[tokio::test]
    async fn test_crashed_file_vetoes_success() {
        let report = r#"{"numPassedTests":0,"numFailedTests":0,"numPendingTests":0,"success":true,
            "testResults":[{"name":"c.test.ts","status":"failed","message":"","startTime":0,"endTime":1,"assertionResults":[]}]}"#;
        let parsed = parse_str(Some(report), None).await;
        assert_eq!(parsed.failed, 1);
        assert!(!parsed.success);
        assert_eq!(parsed.failures[0].error, "Test suite failed to run");
    }

    #[tokio::test]
    async fn test_missing_artifact_without_log() {
        let dir = tempdir().unwrap();
        let parsed = JestParser
            .parse(&dir.path().join("none.json"), None)
            .await
            .unwrap();
        assert_eq!(parsed, ParseResult::empty());
    }

    #[tokio::test]
    async fn test_missing_artifact_with_crash_log() {
        let parsed = parse_str(None, Some("Command: jest\nReferenceError: foo is not defined\n")).await;
        assert_eq!(parsed.failed, 1);
        assert_eq!(parsed.failures[0].test_name, FRAMEWORK_CRASH_NAME);
    }

    #[tokio::test]
    async fn test_corrupted_artifact() {
        let truncated = &passing_report()[..40];
        let parsed = parse_str(Some(truncated), Some("Exit Code: 1\n")).await;
        assert_eq!(parsed.failures.len(), 1);
        assert_eq!(parsed.failures[0].test_name, PARSE_ERROR_NAME);

        let parsed = parse_str(Some(truncated), Some("SyntaxError: Unexpected token\n")).await;
        assert_eq!(parsed.failures[0].test_name, FRAMEWORK_CRASH_NAME);
    }

    #[tokio::test]
    async fn test_empty_artifact_is_corruption() {
        let parsed = parse_str(Some("   "), None).await;
        assert_eq!(parsed.failures[0].test_name, PARSE_ERROR_NAME);
    }
}
