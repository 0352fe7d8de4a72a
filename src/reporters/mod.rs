//! Run reporters
//!
//! Reporters observe a run at three points: start, each finished suite and
//! completion. They never influence the outcome.

mod console;
pub mod custom;
mod json;
mod markdown;
mod summary_log;
mod text;
mod timing;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use crate::models::{AggregatedResults, Suite, SuiteResult};

pub use console::ConsoleReporter;
pub use custom::{
    is_reporter_path, CommandReporter, ReporterError, ReporterExport, ReporterFactory,
    ReporterModule, ReporterRegistry,
};
pub use json::JsonReporter;
pub use markdown::MarkdownReporter;
pub use summary_log::SummaryLogReporter;
pub use text::TextReporter;
pub use timing::{TimingReporter, TimingTextReporter};

/// Built-in reporter names
pub const REPORTER_NAMES: &[&str] = &[
    "console",
    "json",
    "markdown-failures",
    "text",
    "summary-log",
    "timing",
    "timing-text",
];

/// Observer of a run
#[async_trait]
pub trait Reporter: Send + Sync {
    fn name(&self) -> &str;

    /// Suites about to run, in configured order
    fn on_start(&self, suites: &[Suite]);

    /// Final result of one suite, after guards have been applied
    fn on_suite_complete(&self, suite: &Suite, result: &SuiteResult);

    async fn on_complete(&self, results: &AggregatedResults) -> Result<()>;
}

#[cfg(test)]
impl std::fmt::Debug for dyn Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter").field("name", &self.name()).finish()
    }
}

#[async_trait]
impl<R: Reporter + ?Sized> Reporter for Arc<R> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn on_start(&self, suites: &[Suite]) {
        (**self).on_start(suites)
    }

    fn on_suite_complete(&self, suite: &Suite, result: &SuiteResult) {
        (**self).on_suite_complete(suite, result)
    }

    async fn on_complete(&self, results: &AggregatedResults) -> Result<()> {
        (**self).on_complete(results).await
    }
}

fn builtin(name: &str, artifacts_dir: &Path) -> Option<Box<dyn Reporter>> {
    let reporter: Box<dyn Reporter> = match name {
        "console" => Box::new(ConsoleReporter::new()),
        "json" => Box::new(JsonReporter::for_artifacts_dir(artifacts_dir)),
        "markdown-failures" => Box::new(MarkdownReporter::new(artifacts_dir)),
        "text" => Box::new(TextReporter::for_artifacts_dir(artifacts_dir)),
        "summary-log" => Box::new(SummaryLogReporter::for_artifacts_dir(artifacts_dir)),
        "timing" => Box::new(TimingReporter::for_artifacts_dir(artifacts_dir)),
        "timing-text" => Box::new(TimingTextReporter::new(artifacts_dir)),
        _ => return None,
    };
    Some(reporter)
}

/// Build reporters by name.
///
/// Built-in names win; registered names and paths load through `registry`
/// and fail the run when they cannot be loaded. Anything else is skipped
/// with a warning.
pub async fn create_reporters(
    names: &[String],
    artifacts_dir: &Path,
    cwd: &Path,
    registry: &ReporterRegistry,
) -> Result<Vec<Box<dyn Reporter>>> {
    let mut reporters: Vec<Box<dyn Reporter>> = Vec::new();
    for name in names {
        if let Some(reporter) = builtin(name, artifacts_dir) {
            reporters.push(reporter);
        } else if registry.handles(name) {
            let reporter = registry.build(name, cwd, artifacts_dir).await?;
            reporters.push(Box::new(reporter));
        } else {
            warn!(
                "Unknown reporter '{}' (available: {})",
                name,
                REPORTER_NAMES.join(", ")
            );
        }
    }
    Ok(reporters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_create_reporters_skips_unknown() {
        let names = vec![
            "console".to_string(),
            "junit".to_string(),
            "json".to_string(),
            "timing".to_string(),
            "summary-log".to_string(),
        ];
        let reporters = create_reporters(
            &names,
            Path::new("/tmp/results"),
            Path::new("/tmp"),
            &ReporterRegistry::new(),
        )
        .await
        .unwrap();
        let built: Vec<&str> = reporters.iter().map(|r| r.name()).collect();
        assert_eq!(built, vec!["console", "json", "timing", "summary-log"]);
    }

    #[tokio::test]
    async fn test_create_reporters_uses_registry() {
        let registry = ReporterRegistry::new().register(
            "plain",
            ReporterModule::constructor(|dir| {
                Ok(Arc::new(TextReporter::for_artifacts_dir(dir)) as Arc<dyn Reporter>)
            }),
        );
        let names = vec!["plain".to_string(), "text".to_string()];
        let reporters = create_reporters(&names, Path::new("/tmp/results"), Path::new("/tmp"), &registry)
            .await
            .unwrap();
        let built: Vec<&str> = reporters.iter().map(|r| r.name()).collect();
        assert_eq!(built, vec!["text", "text"]);
    }

    #[tokio::test]
    async fn test_missing_reporter_path_is_an_error() {
        let dir = tempdir().unwrap();
        let names = vec!["./reporters/notify.sh".to_string()];
        let err = create_reporters(&names, &dir.path().join("results"), dir.path(), &ReporterRegistry::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReporterError>(),
            Some(ReporterError::Load { .. })
        ));
    }
}
