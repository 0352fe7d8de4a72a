//! Test result models
//!
//! Defines parse results, per-suite outcomes, error categories and the
//! run-wide aggregate with its semantic exit code.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

/// Status of a single test
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

impl TestStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            TestStatus::Passed => "✓",
            TestStatus::Failed => "✗",
            TestStatus::Skipped => "○",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Passed => write!(f, "PASS"),
            TestStatus::Failed => write!(f, "FAIL"),
            TestStatus::Skipped => write!(f, "SKIP"),
        }
    }
}

/// File attached to a failed test (screenshot, trace, video)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub path: String,
}

/// A failed test, a framework crash or a guard rejection
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureDetail {
    pub test_name: String,
    #[serde(default)]
    pub file_path: String,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, rename = "duration", skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl FailureDetail {
    pub fn new(
        test_name: impl Into<String>,
        file_path: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            test_name: test_name.into(),
            file_path: file_path.into(),
            error: error.into(),
            stack: None,
            stdout: None,
            stderr: None,
            attachments: Vec::new(),
            duration_ms: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

/// Per-test timing record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub file: String,
    pub status: TestStatus,
    #[serde(rename = "duration")]
    pub duration_ms: u64,
}

/// Uniform output of every parser
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResult {
    pub passed: u64,
    pub failed: u64,
    pub skipped: u64,
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    pub success: bool,
    #[serde(default)]
    pub failures: Vec<FailureDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_results: Option<Vec<TestResult>>,
}

impl ParseResult {
    /// Nothing ran: zero counts, successful
    pub fn empty() -> Self {
        Self {
            passed: 0,
            failed: 0,
            skipped: 0,
            duration_ms: 0,
            success: true,
            failures: Vec::new(),
            test_results: None,
        }
    }

    /// A single synthetic failure (crash, corruption, parse error)
    pub fn single_failure(failure: FailureDetail) -> Self {
        Self {
            passed: 0,
            failed: 1,
            skipped: 0,
            duration_ms: 0,
            success: false,
            failures: vec![failure],
            test_results: None,
        }
    }

    pub fn total(&self) -> u64 {
        self.passed + self.failed + self.skipped
    }
}

/// Why a suite did not pass cleanly; ordered by severity
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    None,
    TestFailure,
    InfraError,
    Timeout,
}

impl ErrorCategory {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            ErrorCategory::None => ExitCode::Pass,
            ErrorCategory::TestFailure => ExitCode::TestFailure,
            ErrorCategory::InfraError => ExitCode::InfraError,
            ErrorCategory::Timeout => ExitCode::Timeout,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::None => "none",
            ErrorCategory::TestFailure => "test_failure",
            ErrorCategory::InfraError => "infra_error",
            ErrorCategory::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process exit code; the total order is the priority order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ExitCode {
    Pass = 0,
    TestFailure = 1,
    InfraError = 2,
    Timeout = 3,
}

impl ExitCode {
    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExitCode::Pass => "PASS",
            ExitCode::TestFailure => "TEST_FAILURE",
            ExitCode::InfraError => "INFRA_ERROR",
            ExitCode::Timeout => "TIMEOUT",
        }
    }
}

impl Serialize for ExitCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.label())
    }
}

/// Outcome of one suite: parse fields plus execution metadata
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteResult {
    pub name: String,
    pub passed: u64,
    pub failed: u64,
    pub skipped: u64,
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    pub success: bool,
    pub failures: Vec<FailureDetail>,
    pub log_file: PathBuf,
    pub result_file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_results: Option<Vec<TestResult>>,
    /// `None` means no category was assigned; see [`compute_exit_code`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
}

impl SuiteResult {
    /// Merge a parse result with the execution metadata of its suite
    pub fn from_parse(
        name: impl Into<String>,
        parse: ParseResult,
        log_file: PathBuf,
        result_file: PathBuf,
    ) -> Self {
        let success = parse.failed == 0 && parse.success;
        Self {
            name: name.into(),
            passed: parse.passed,
            failed: parse.failed,
            skipped: parse.skipped,
            duration_ms: parse.duration_ms,
            success,
            failures: parse.failures,
            log_file,
            result_file,
            test_results: parse.test_results,
            error_category: None,
        }
    }

    pub fn total(&self) -> u64 {
        self.passed + self.failed + self.skipped
    }
}

impl fmt::Display for SuiteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = if self.success { "✓" } else { "✗" };
        write!(
            f,
            "{} {} - {} passed, {} failed, {} skipped [{}ms]",
            symbol, self.name, self.passed, self.failed, self.skipped, self.duration_ms
        )
    }
}

/// Summed counts across suites
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub passed: u64,
    pub failed: u64,
    pub skipped: u64,
    #[serde(rename = "duration")]
    pub duration_ms: u64,
}

impl Totals {
    pub fn total(&self) -> u64 {
        self.passed + self.failed + self.skipped
    }
}

/// Run-wide outcome
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedResults {
    pub suites: Vec<SuiteResult>,
    pub totals: Totals,
    pub success: bool,
    pub pass_rate: f64,
    pub exit_code: ExitCode,
}

impl AggregatedResults {
    /// Fold completed suites, in the order given, into the run outcome
    pub fn from_suites(suites: Vec<SuiteResult>) -> Self {
        let totals = suites.iter().fold(Totals::default(), |acc, s| Totals {
            passed: acc.passed + s.passed,
            failed: acc.failed + s.failed,
            skipped: acc.skipped + s.skipped,
            duration_ms: acc.duration_ms + s.duration_ms,
        });

        let total = totals.total();
        let pass_rate = if total > 0 {
            (totals.passed as f64 / total as f64) * 100.0
        } else {
            100.0
        };
        let exit_code = compute_exit_code(&suites);

        Self {
            success: totals.failed == 0,
            suites,
            totals,
            pass_rate,
            exit_code,
        }
    }
}

impl fmt::Display for AggregatedResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for suite in &self.suites {
            writeln!(f, "  {suite}")?;
        }
        writeln!(
            f,
            "Total: {} | Pass: {} | Fail: {} | Skip: {}",
            self.totals.total(),
            self.totals.passed,
            self.totals.failed,
            self.totals.skipped
        )?;
        write!(
            f,
            "Pass Rate: {:.1}% | Exit Code: {}",
            self.pass_rate, self.exit_code
        )
    }
}

/// Worst category across suites; a timeout short-circuits.
///
/// A failed suite never maps to `Pass`: one without a category, or tagged
/// `none`, that reports `success: false` counts as a test failure. This
/// fallback keeps hooks and parsers that never set a category from exiting 0,
/// but it can hide an infrastructure problem behind exit 1.
pub fn compute_exit_code(suites: &[SuiteResult]) -> ExitCode {
    let mut worst = ExitCode::Pass;
    for suite in suites {
        let code = match suite.error_category {
            Some(ErrorCategory::Timeout) => return ExitCode::Timeout,
            Some(ErrorCategory::None) if !suite.success => ExitCode::TestFailure,
            Some(category) => category.exit_code(),
            None if !suite.success => ExitCode::TestFailure,
            None => ExitCode::Pass,
        };
        worst = worst.max(code);
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suite_result(name: &str, failed: u64, category: Option<ErrorCategory>) -> SuiteResult {
        SuiteResult {
            name: name.to_string(),
            passed: 10,
            failed,
            skipped: 0,
            duration_ms: 1000,
            success: failed == 0,
            failures: Vec::new(),
            log_file: PathBuf::from("/tmp/test.log"),
            result_file: PathBuf::from("/tmp/test.json"),
            test_results: None,
            error_category: category,
        }
    }

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Pass.code(), 0);
        assert_eq!(ExitCode::TestFailure.code(), 1);
        assert_eq!(ExitCode::InfraError.code(), 2);
        assert_eq!(ExitCode::Timeout.code(), 3);
    }

    #[test]
    fn test_exit_code_all_pass() {
        let suites = vec![
            suite_result("a", 0, Some(ErrorCategory::None)),
            suite_result("b", 0, Some(ErrorCategory::None)),
        ];
        assert_eq!(compute_exit_code(&suites), ExitCode::Pass);
    }

    #[test]
    fn test_exit_code_priority() {
        let suites = vec![
            suite_result("fail", 2, Some(ErrorCategory::TestFailure)),
            suite_result("infra", 1, Some(ErrorCategory::InfraError)),
            suite_result("ok", 0, Some(ErrorCategory::None)),
        ];
        assert_eq!(compute_exit_code(&suites), ExitCode::InfraError);

        let mut with_timeout = suites.clone();
        with_timeout.insert(1, suite_result("slow", 0, Some(ErrorCategory::Timeout)));
        assert_eq!(compute_exit_code(&with_timeout), ExitCode::Timeout);

        let failures_only = vec![
            suite_result("ok", 0, Some(ErrorCategory::None)),
            suite_result("fail", 1, Some(ErrorCategory::TestFailure)),
        ];
        assert_eq!(compute_exit_code(&failures_only), ExitCode::TestFailure);
    }

    #[test]
    fn test_exit_code_failed_suite_tagged_none() {
        let mut vetoed = suite_result("coverage", 0, Some(ErrorCategory::None));
        vetoed.success = false;
        assert_eq!(compute_exit_code(&[vetoed]), ExitCode::TestFailure);
    }

    #[test]
    fn test_exit_code_fallback_for_missing_category() {
        let suites = vec![suite_result("no-category", 3, None)];
        assert_eq!(compute_exit_code(&suites), ExitCode::TestFailure);

        let passing = vec![suite_result("no-category", 0, None)];
        assert_eq!(compute_exit_code(&passing), ExitCode::Pass);
    }

    #[test]
    fn test_aggregate_totals_and_pass_rate() {
        let mut b = suite_result("b", 2, Some(ErrorCategory::TestFailure));
        b.passed = 6;
        b.skipped = 2;
        let results = AggregatedResults::from_suites(vec![
            suite_result("a", 0, Some(ErrorCategory::None)),
            b,
        ]);

        assert_eq!(results.totals.passed, 16);
        assert_eq!(results.totals.failed, 2);
        assert_eq!(results.totals.skipped, 2);
        assert_eq!(results.totals.duration_ms, 2000);
        assert!(!results.success);
        assert!((results.pass_rate - 80.0).abs() < f64::EPSILON);
        assert_eq!(results.exit_code, ExitCode::TestFailure);
        assert_eq!(results.suites[0].name, "a");
    }

    #[test]
    fn test_pass_rate_with_no_tests() {
        let mut empty = suite_result("empty", 0, Some(ErrorCategory::None));
        empty.passed = 0;
        let results = AggregatedResults::from_suites(vec![empty]);
        assert_eq!(results.pass_rate, 100.0);
        assert!(results.success);
    }

    #[test]
    fn test_parse_result_veto() {
        let mut parse = ParseResult::empty();
        parse.success = false;
        let result = SuiteResult::from_parse("vetoed", parse, "a.log".into(), "a.json".into());
        assert!(!result.success);
        assert_eq!(result.failed, 0);
    }

    #[test]
    fn test_category_ordering() {
        assert!(ErrorCategory::Timeout > ErrorCategory::InfraError);
        assert!(ErrorCategory::InfraError > ErrorCategory::TestFailure);
        assert!(ErrorCategory::TestFailure > ErrorCategory::None);
    }

    #[test]
    fn test_parse_result_wire_format() {
        let json = r#"{"passed":2,"failed":1,"skipped":0,"duration":40,"success":false,
            "failures":[{"testName":"a > b","filePath":"a.test.ts","error":"boom"}]}"#;
        let parsed: ParseResult = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.failures[0].test_name, "a > b");
        assert_eq!(parsed.duration_ms, 40);
        assert!(parsed.test_results.is_none());
    }
}
