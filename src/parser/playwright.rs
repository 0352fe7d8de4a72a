//! Playwright JSON reporter parser

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{corrupted_artifact, missing_artifact, read_artifact, Artifact, Parser, ParserError};
use crate::models::{Attachment, FailureDetail, ParseResult, TestResult, TestStatus};

#[derive(Debug, Deserialize)]
struct PlaywrightReport {
    #[serde(default)]
    suites: Vec<PlaywrightSuite>,
    stats: PlaywrightStats,
}

#[derive(Debug, Deserialize)]
struct PlaywrightStats {
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    expected: u64,
    #[serde(default)]
    unexpected: u64,
    #[serde(default)]
    skipped: u64,
}

#[derive(Debug, Deserialize)]
struct PlaywrightSuite {
    title: String,
    #[serde(default)]
    file: String,
    #[serde(default)]
    specs: Vec<PlaywrightSpec>,
    #[serde(default)]
    suites: Vec<PlaywrightSuite>,
}

#[derive(Debug, Deserialize)]
struct PlaywrightSpec {
    title: String,
    ok: bool,
    #[serde(default)]
    tests: Vec<PlaywrightTest>,
}

#[derive(Debug, Deserialize)]
struct PlaywrightTest {
    #[serde(default)]
    results: Vec<PlaywrightAttempt>,
}

/// One run of a test; retries produce several
#[derive(Debug, Deserialize)]
struct PlaywrightAttempt {
    status: String,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    error: Option<PlaywrightError>,
    #[serde(default)]
    errors: Vec<PlaywrightError>,
    #[serde(default)]
    stdout: Vec<PlaywrightOutput>,
    #[serde(default)]
    stderr: Vec<PlaywrightOutput>,
    #[serde(default)]
    attachments: Vec<PlaywrightAttachment>,
}

#[derive(Debug, Deserialize)]
struct PlaywrightError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    stack: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaywrightOutput {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaywrightAttachment {
    name: String,
    #[serde(default)]
    path: Option<String>,
}

impl PlaywrightAttempt {
    fn status(&self) -> TestStatus {
        match self.status.as_str() {
            "passed" => TestStatus::Passed,
            "skipped" => TestStatus::Skipped,
            _ => TestStatus::Failed,
        }
    }

    fn error_message(&self) -> String {
        if let Some(message) = self.error.as_ref().and_then(|e| e.message.clone()) {
            if !message.is_empty() {
                return message;
            }
        }
        let joined = self
            .errors
            .iter()
            .filter_map(|e| e.message.as_deref())
            .collect::<Vec<_>>()
            .join("\n");
        if joined.is_empty() {
            "Unknown error".to_string()
        } else {
            joined
        }
    }

    fn stack(&self) -> Option<String> {
        if let Some(stack) = self.error.as_ref().and_then(|e| e.stack.clone()) {
            return Some(stack);
        }
        let joined = self
            .errors
            .iter()
            .filter_map(|e| e.stack.as_deref())
            .collect::<Vec<_>>()
            .join("\n");
        (!joined.is_empty()).then_some(joined)
    }
}

/// Parser for Playwright's nested suite tree
#[derive(Clone, Copy, Debug, Default)]
pub struct PlaywrightParser;

#[async_trait]
impl Parser for PlaywrightParser {
    async fn parse(
        &self,
        result_file: &Path,
        log_file: Option<&Path>,
    ) -> Result<ParseResult, ParserError> {
        let content = match read_artifact(result_file).await? {
            // Playwright can leave an empty file behind when it never starts.
            Artifact::Missing | Artifact::Empty => return Ok(missing_artifact(log_file).await),
            Artifact::Content(content) => content,
        };

        let report: PlaywrightReport = match serde_json::from_str(&content) {
            Ok(report) => report,
            Err(e) => {
                debug!("Unparseable Playwright report {}: {}", result_file.display(), e);
                return Ok(corrupted_artifact(result_file, log_file, e.to_string()).await);
            }
        };

        let mut failures = Vec::new();
        let mut test_results = Vec::new();
        collect(&report.suites, None, &mut failures, &mut test_results);

        Ok(ParseResult {
            passed: report.stats.expected,
            failed: report.stats.unexpected,
            skipped: report.stats.skipped,
            duration_ms: report.stats.duration.max(0.0) as u64,
            success: report.stats.unexpected == 0,
            failures,
            test_results: Some(test_results),
        })
    }
}

fn collect(
    suites: &[PlaywrightSuite],
    parent: Option<&str>,
    failures: &mut Vec<FailureDetail>,
    test_results: &mut Vec<TestResult>,
) {
    for suite in suites {
        let suite_title = match parent {
            Some(parent) => format!("{parent} > {}", suite.title),
            None => suite.title.clone(),
        };

        for spec in &suite.specs {
            let name = format!("{suite_title} > {}", spec.title);
            for test in &spec.tests {
                // Only the final retry decides the outcome.
                let Some(last) = test.results.last() else {
                    continue;
                };
                let status = last.status();
                let duration = last.duration.max(0.0) as u64;

                test_results.push(TestResult {
                    name: name.clone(),
                    file: suite.file.clone(),
                    status,
                    duration_ms: duration,
                });

                if !spec.ok && status != TestStatus::Passed {
                    failures.push(failure_for(&name, &suite.file, &test.results, last, duration));
                }
            }
        }

        collect(&suite.suites, Some(&suite_title), failures, test_results);
    }
}

/// Failure from the last attempt, with output and attachments from every attempt
fn failure_for(
    name: &str,
    file: &str,
    attempts: &[PlaywrightAttempt],
    last: &PlaywrightAttempt,
    duration: u64,
) -> FailureDetail {
    let mut failure = FailureDetail::new(name, file, last.error_message()).with_duration(duration);
    failure.stack = last.stack();
    failure.stdout = join_output(attempts.iter().flat_map(|a| &a.stdout));
    failure.stderr = join_output(attempts.iter().flat_map(|a| &a.stderr));
    failure.attachments = attempts
        .iter()
        .flat_map(|a| a.attachments.iter())
        .filter_map(|a| {
            a.path.as_ref().map(|path| Attachment {
                name: a.name.clone(),
                path: path.clone(),
            })
        })
        .collect();
    failure
}

fn join_output<'a>(outputs: impl Iterator<Item = &'a PlaywrightOutput>) -> Option<String> {
    let text = outputs
        .filter_map(|o| o.text.as_deref())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::crash::FRAMEWORK_CRASH_NAME;
    use tempfile::tempdir;

    const REPORT: &str = r#"{
      "config": {},
      "stats": {"startTime":"2024-01-01T00:00:00Z","duration":1530.5,"expected":2,"unexpected":1,"skipped":1,"flaky":0},
      "suites": [{
        "title": "auth.spec.ts",
        "file": "auth.spec.ts",
        "specs": [
          {"title":"logs in","ok":true,"tests":[{"results":[{"status":"passed","duration":120}]}]}
        ],
        "suites": [{
          "title": "checkout",
          "file": "auth.spec.ts",
          "specs": [
            {"title":"pays","ok":false,"tests":[{"results":[
              {"status":"failed","duration":300,"error":{"message":"first"},
               "stdout":[{"text":"attempt one"}],"attachments":[{"name":"trace","path":"/t/1.zip"}]},
              {"status":"timedOut","duration":500,
               "errors":[{"message":"Timeout 500ms","stack":"at pay()"}],
               "stdout":[{"text":"attempt two"}],"stderr":[{"text":"warn"}],
               "attachments":[{"name":"screenshot","path":"/t/2.png"},{"name":"inline"}]}
            ]}]},
            {"title":"skips","ok":true,"tests":[{"results":[{"status":"skipped","duration":0}]}]},
            {"title":"recovers","ok":true,"tests":[{"results":[{"status":"failed","duration":50},{"status":"passed","duration":60}]}]}
          ]
        }]
      }]
    }"#;

    async fn parse(content: Option<&str>, log: Option<&str>) -> ParseResult {
        let dir = tempdir().unwrap();
        let result = dir.path().join("e2e.json");
        let log_path = dir.path().join("e2e.log");
        if let Some(content) = content {
            std::fs::write(&result, content).unwrap();
        }
        if let Some(log) = log {
            std::fs::write(&log_path, log).unwrap();
        }
        PlaywrightParser.parse(&result, Some(&log_path)).await.unwrap()
    }

    #[tokio::test]
    async fn test_counts_from_stats() {
        let parsed = parse(Some(REPORT), None).await;
        assert_eq!(parsed.passed, 2);
        assert_eq!(parsed.failed, 1);
        assert_eq!(parsed.skipped, 1);
        assert_eq!(parsed.duration_ms, 1530);
        assert!(!parsed.success);
    }

    #[tokio::test]
    async fn test_nested_names_and_last_attempt() {
        let parsed = parse(Some(REPORT), None).await;
        let results = parsed.test_results.unwrap();
        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "auth.spec.ts > logs in",
                "auth.spec.ts > checkout > pays",
                "auth.spec.ts > checkout > skips",
                "auth.spec.ts > checkout > recovers",
            ]
        );
        assert_eq!(results[1].status, TestStatus::Failed);
        assert_eq!(results[2].status, TestStatus::Skipped);
        assert_eq!(results[3].status, TestStatus::Passed);
    }

    #[tokio::test]
    async fn test_failure_merges_attempt_output() {
        let parsed = parse(Some(REPORT), None).await;
        assert_eq!(parsed.failures.len(), 1);

        let failure = &parsed.failures[0];
        assert_eq!(failure.test_name, "auth.spec.ts > checkout > pays");
        assert_eq!(failure.error, "Timeout 500ms");
        assert_eq!(failure.stack.as_deref(), Some("at pay()"));
        assert_eq!(failure.stdout.as_deref(), Some("attempt one\nattempt two"));
        assert_eq!(failure.stderr.as_deref(), Some("warn"));
        assert_eq!(failure.duration_ms, Some(500));
        let attachments: Vec<&str> = failure.attachments.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(attachments, vec!["trace", "screenshot"]);
    }

    #[tokio::test]
    async fn test_unknown_error_fallback() {
        let report = r#"{"stats":{"duration":1,"expected":0,"unexpected":1,"skipped":0},
            "suites":[{"title":"a","file":"a.spec.ts","specs":[
              {"title":"b","ok":false,"tests":[{"results":[{"status":"failed","duration":1}]}]}]}]}"#;
        let parsed = parse(Some(report), None).await;
        assert_eq!(parsed.failures[0].error, "Unknown error");
    }

    #[tokio::test]
    async fn test_missing_and_empty_artifacts() {
        assert_eq!(parse(None, None).await, ParseResult::empty());
        assert_eq!(parse(Some(""), Some("Running 3 tests\n")).await, ParseResult::empty());

        let crashed = parse(Some("\n"), Some("Error: connect ECONNREFUSED\n")).await;
        assert_eq!(crashed.failures[0].test_name, FRAMEWORK_CRASH_NAME);
    }

    #[tokio::test]
    async fn test_corrupted_artifact() {
        let parsed = parse(Some(&REPORT[..100]), None).await;
        assert_eq!(parsed.failed, 1);
        assert!(parsed.failures[0].error.contains("corrupted or truncated"));
    }
}
