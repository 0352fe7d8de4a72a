//! Console reporter

use std::sync::Mutex;
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;

use super::Reporter;
use crate::models::{AggregatedResults, ExitCode, Suite, SuiteResult};
use crate::utils::ansi::strip_ansi;

const RESET: &str = "\x1b[0m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const GRAY: &str = "\x1b[90m";
const BOLD: &str = "\x1b[1m";

/// Colored progress and summary on stdout
pub struct ConsoleReporter {
    colorize: bool,
    started: Mutex<Option<Instant>>,
}

impl ConsoleReporter {
    /// Colors are on unless `NO_COLOR` is set
    pub fn new() -> Self {
        Self {
            colorize: std::env::var_os("NO_COLOR").is_none(),
            started: Mutex::new(None),
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.colorize {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    /// One line per suite plus the first failure, if any
    pub fn format_suite_line(&self, suite: &Suite, result: &SuiteResult) -> String {
        let icon = if result.success {
            self.paint(GREEN, "✓")
        } else {
            self.paint(RED, "✗")
        };
        let time = format!("{:.1}s", result.duration_ms as f64 / 1000.0);
        let stats = if result.success {
            self.paint(GREEN, &format!("{} passed", result.passed))
        } else {
            format!(
                "{}, {}",
                self.paint(GREEN, &format!("{} passed", result.passed)),
                self.paint(RED, &format!("{} failed", result.failed))
            )
        };

        let mut line = format!("{icon} {}: {stats} ({time})", suite.name);
        if !result.success {
            if let Some(first) = result.failures.first() {
                line.push_str(&format!("\n  {}", self.paint(GRAY, &format!("└─ {}", first.test_name))));
                let error = strip_ansi(&first.error);
                let error_line: String = error.lines().next().unwrap_or("").chars().take(80).collect();
                if !error_line.is_empty() {
                    line.push_str(&format!("\n     {}", self.paint(RED, &error_line)));
                }
            }
        }
        line
    }

    /// Summary table, verdict and exit code
    pub fn format_summary(&self, results: &AggregatedResults, total_ms: u64) -> String {
        let mut out = Vec::new();
        out.push(String::new());
        out.push(self.paint(CYAN, &"─".repeat(50)));
        out.push(self.paint(BOLD, "  SUMMARY"));
        out.push(self.paint(CYAN, &"─".repeat(50)));
        out.push(String::new());
        out.push(self.paint(GRAY, "Suite                Passed  Failed  Skipped    Time"));
        out.push(self.paint(GRAY, &"─".repeat(55)));

        for suite in &results.suites {
            let row = format!(
                "{:<20}{:>6}{:>8}{:>9}{:>8}",
                suite.name,
                suite.passed,
                suite.failed,
                suite.skipped,
                format!("{:.1}s", suite.duration_ms as f64 / 1000.0)
            );
            out.push(if suite.success { row } else { self.paint(RED, &row) });
        }

        out.push(self.paint(GRAY, &"─".repeat(55)));
        let totals = &results.totals;
        out.push(self.paint(
            BOLD,
            &format!(
                "{:<20}{:>6}{:>8}{:>9}{:>8}",
                "TOTAL",
                totals.passed,
                totals.failed,
                totals.skipped,
                format!("{:.1}s", total_ms as f64 / 1000.0)
            ),
        ));
        out.push(String::new());

        let verdict = match results.exit_code {
            ExitCode::Pass => self.paint(GREEN, "✓ ALL TESTS PASSED"),
            ExitCode::TestFailure => self.paint(RED, "✗ TESTS FAILED"),
            ExitCode::InfraError => self.paint(RED, "✗ INFRASTRUCTURE ERROR"),
            ExitCode::Timeout => self.paint(YELLOW, "✗ TIMEOUT"),
        };
        out.push(verdict);
        out.push(String::new());
        out.push(self.paint(
            GRAY,
            &format!(
                "Pass Rate: {:.1}% | Total: {} | Exit Code: {}",
                results.pass_rate,
                totals.total(),
                results.exit_code
            ),
        ));
        out.push(String::new());
        out.join("\n")
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Reporter for ConsoleReporter {
    fn name(&self) -> &str {
        "console"
    }

    fn on_start(&self, suites: &[Suite]) {
        *self.started.lock().unwrap_or_else(|p| p.into_inner()) = Some(Instant::now());

        println!();
        println!("{}", self.paint(CYAN, &"=".repeat(50)));
        println!("{}", self.paint(CYAN, "  TESTFOLD"));
        println!("{}", self.paint(CYAN, &"=".repeat(50)));
        println!();
        println!("{}", self.paint(GRAY, &format!("Running {} suite(s)...", suites.len())));
        println!();
    }

    fn on_suite_complete(&self, suite: &Suite, result: &SuiteResult) {
        println!("{}", self.format_suite_line(suite, result));
    }

    async fn on_complete(&self, results: &AggregatedResults) -> Result<()> {
        let started = *self.started.lock().unwrap_or_else(|p| p.into_inner());
        let total_ms = started
            .map(|start| start.elapsed().as_millis() as u64)
            .unwrap_or(results.totals.duration_ms);
        println!("{}", self.format_summary(results, total_ms));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ErrorCategory, FailureDetail, ParseResult, SuiteKind};

    fn failing_result() -> SuiteResult {
        let mut parse = ParseResult::single_failure(FailureDetail::new(
            "Auth > login",
            "auth.spec.ts",
            "expected 200\nreceived 500",
        ));
        parse.passed = 4;
        parse.duration_ms = 2500;
        let mut result = SuiteResult::from_parse("e2e", parse, "e2e.log".into(), "e2e.json".into());
        result.error_category = Some(ErrorCategory::TestFailure);
        result
    }

    #[test]
    fn test_suite_line_shows_first_failure() {
        let reporter = ConsoleReporter::new().no_color();
        let suite = Suite::new("e2e", SuiteKind::Playwright, "npx playwright test", "e2e.json");
        let line = reporter.format_suite_line(&suite, &failing_result());
        assert_eq!(
            line,
            "✗ e2e: 4 passed, 1 failed (2.5s)\n  └─ Auth > login\n     expected 200"
        );
    }

    #[test]
    fn test_summary_table() {
        let reporter = ConsoleReporter::new().no_color();
        let results = AggregatedResults::from_suites(vec![failing_result()]);
        let summary = reporter.format_summary(&results, 3000);
        assert!(summary.contains("e2e                      4       1        0    2.5s"));
        assert!(summary.contains("✗ TESTS FAILED"));
        assert!(summary.contains("Pass Rate: 80.0% | Total: 5 | Exit Code: 1 (TEST_FAILURE)"));
    }
}
