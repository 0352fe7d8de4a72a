//! Data models for suite orchestration
//!
//! This module contains all data structures shared by the executor, parsers,
//! orchestrator and reporters.

mod suite;
mod test_result;

pub use suite::{Suite, SuiteEnvironment, SuiteKind, UrlExtractor};
pub use test_result::{
    compute_exit_code, AggregatedResults, Attachment, ErrorCategory, ExitCode, FailureDetail,
    ParseResult, SuiteResult, TestResult, TestStatus, Totals,
};
