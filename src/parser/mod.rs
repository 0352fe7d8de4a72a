//! Result parsers
//!
//! Each parser turns a framework's result artifact (plus the suite log, for
//! crash detection) into a [`ParseResult`]. Missing, empty and corrupted
//! artifacts are ordinary outcomes, not errors.

pub mod crash;
pub mod custom;
mod jest;
mod playwright;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{FailureDetail, ParseResult, Suite, SuiteKind};

pub use custom::{
    CommandParser, CustomParserLoader, ModuleLoader, ParserExport, ParserFactory, ParserModule,
    ParserRegistry,
};
pub use jest::JestParser;
pub use playwright::PlaywrightParser;

/// Name of the synthetic failure for an unreadable artifact or a parser error
pub const PARSE_ERROR_NAME: &str = "Result Parse Error";

/// Parser errors
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Suite '{suite}' has type custom but no parser configured")]
    MissingParserReference { suite: String },

    #[error("Failed to load custom parser from {reference}: {message}")]
    ParserLoad { reference: String, message: String },

    #[error(
        "Custom parser at {reference} does not export a valid parser. \
         Export must provide parse(result_path, log_path) -> ParseResult \
         as a default constructor, a default instance or a named 'parser' export"
    )]
    InvalidParserShape { reference: String },

    #[error("Parser command {program} failed: {message}")]
    Command { program: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Converts a result artifact into a [`ParseResult`]
#[async_trait]
pub trait Parser: Send + Sync {
    async fn parse(&self, result_file: &Path, log_file: Option<&Path>)
        -> Result<ParseResult, ParserError>;
}

/// Parser for a suite's kind.
///
/// Custom suites get a lazily loading wrapper; a custom suite without a parser
/// reference fails here rather than at config validation.
pub fn parser_for(
    suite: &Suite,
    cwd: &Path,
    loader: Arc<dyn ModuleLoader>,
) -> Result<Arc<dyn Parser>, ParserError> {
    match suite.kind {
        SuiteKind::Jest => Ok(Arc::new(JestParser)),
        SuiteKind::Playwright => Ok(Arc::new(PlaywrightParser)),
        SuiteKind::Custom => {
            let reference = suite
                .parser
                .as_deref()
                .filter(|r| !r.trim().is_empty())
                .ok_or_else(|| ParserError::MissingParserReference {
                    suite: suite.name.clone(),
                })?;
            Ok(Arc::new(CustomParserLoader::new(reference, cwd, loader)))
        }
    }
}

/// Result artifact as found on disk
#[derive(Debug)]
pub(crate) enum Artifact {
    Missing,
    /// Present but blank after trimming
    Empty,
    Content(String),
}

pub(crate) async fn read_artifact(path: &Path) -> Result<Artifact, ParserError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) if content.trim().is_empty() => Ok(Artifact::Empty),
        Ok(content) => Ok(Artifact::Content(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Artifact::Missing),
        Err(e) => Err(e.into()),
    }
}

/// No usable artifact: a crash if the log says so, otherwise "nothing ran"
pub(crate) async fn missing_artifact(log_file: Option<&Path>) -> ParseResult {
    match crash::crash_from_log(log_file).await {
        Some(crash) => ParseResult::single_failure(crash),
        None => ParseResult::empty(),
    }
}

/// Unparseable artifact: prefer a crash explanation from the log
pub(crate) async fn corrupted_artifact(
    result_file: &Path,
    log_file: Option<&Path>,
    cause: String,
) -> ParseResult {
    if let Some(crash) = crash::crash_from_log(log_file).await {
        return ParseResult::single_failure(crash);
    }
    ParseResult::single_failure(FailureDetail::new(
        PARSE_ERROR_NAME,
        result_file.to_string_lossy(),
        format!(
            "Result file is corrupted or truncated ({}): {}",
            result_file.display(),
            cause
        ),
    ))
}

/// Failure recorded when a parser itself errors
pub fn parse_error_result(result_file: &Path, error: &ParserError) -> ParseResult {
    ParseResult::single_failure(FailureDetail::new(
        PARSE_ERROR_NAME,
        result_file.to_string_lossy(),
        error.to_string(),
    ))
}
