//! Custom reporters
//!
//! A reporter name that is neither built in nor plain resolves through a
//! [`ReporterRegistry`] to a [`ReporterModule`]. Its exports are checked the
//! same way as parser modules:
//!
//! 1. a default constructor, called with the artifacts directory
//! 2. a default instance
//! 3. a named export called `reporter`
//!
//! Path-like names (`./notify.sh`, `/opt/ci/report`) that are not registered
//! load an executable from disk as a [`CommandReporter`].

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use super::json::Summary;
use super::Reporter;
use crate::models::{AggregatedResults, Suite, SuiteResult};

/// Name of the conventional named export
pub const NAMED_REPORTER_EXPORT: &str = "reporter";

/// Script extensions that mark a reporter name as a path
const SCRIPT_EXTENSIONS: &[&str] = &["sh", "py", "js", "mjs", "ts"];

#[derive(Error, Debug)]
pub enum ReporterError {
    #[error("Failed to load custom reporter from {reference}: {message}")]
    Load { reference: String, message: String },

    #[error(
        "Custom reporter at {reference} does not export a valid reporter. \
         Export must implement on_start(), on_suite_complete() and on_complete() \
         as a default constructor, a default instance or a named 'reporter' export"
    )]
    InvalidShape { reference: String },
}

/// Builds a reporter for the given artifacts directory
pub type ReporterFactory =
    Arc<dyn Fn(&Path) -> Result<Arc<dyn Reporter>, String> + Send + Sync>;

/// One exported value of a reporter module
#[derive(Clone)]
pub enum ReporterExport {
    Constructor(ReporterFactory),
    Instance(Arc<dyn Reporter>),
    /// Something that is not a reporter; the description names it in logs
    Opaque(String),
}

impl fmt::Debug for ReporterExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReporterExport::Constructor(_) => f.write_str("Constructor(..)"),
            ReporterExport::Instance(r) => write!(f, "Instance({})", r.name()),
            ReporterExport::Opaque(what) => write!(f, "Opaque({what})"),
        }
    }
}

/// Exports of a loaded reporter module
#[derive(Clone, Debug, Default)]
pub struct ReporterModule {
    pub default: Option<ReporterExport>,
    pub named: HashMap<String, ReporterExport>,
}

impl ReporterModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(mut self, export: ReporterExport) -> Self {
        self.default = Some(export);
        self
    }

    pub fn with_named(mut self, name: impl Into<String>, export: ReporterExport) -> Self {
        self.named.insert(name.into(), export);
        self
    }

    pub fn constructor<F>(factory: F) -> Self
    where
        F: Fn(&Path) -> Result<Arc<dyn Reporter>, String> + Send + Sync + 'static,
    {
        Self::new().with_default(ReporterExport::Constructor(Arc::new(factory)))
    }

    pub fn instance(reporter: Arc<dyn Reporter>) -> Self {
        Self::new().with_default(ReporterExport::Instance(reporter))
    }

    /// First usable reporter among the exports, in order
    pub fn resolve(
        &self,
        reference: &str,
        artifacts_dir: &Path,
    ) -> Result<Arc<dyn Reporter>, ReporterError> {
        match &self.default {
            Some(ReporterExport::Constructor(factory)) => match factory(artifacts_dir) {
                Ok(reporter) => return Ok(reporter),
                Err(e) => debug!("Default constructor of {} failed: {}", reference, e),
            },
            Some(ReporterExport::Instance(reporter)) => return Ok(Arc::clone(reporter)),
            Some(ReporterExport::Opaque(what)) => {
                debug!("Default export of {} is not a reporter: {}", reference, what)
            }
            None => {}
        }

        if let Some(ReporterExport::Instance(reporter)) = self.named.get(NAMED_REPORTER_EXPORT) {
            return Ok(Arc::clone(reporter));
        }

        Err(ReporterError::InvalidShape {
            reference: reference.to_string(),
        })
    }
}

/// True when a reporter name points at a file rather than a registered name
pub fn is_reporter_path(name: &str) -> bool {
    name.starts_with("./")
        || name.starts_with("../")
        || Path::new(name).is_absolute()
        || Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| SCRIPT_EXTENSIONS.contains(&e))
}

/// Reporter modules registered in code, with executables on disk as fallback
#[derive(Clone, Debug, Default)]
pub struct ReporterRegistry {
    modules: HashMap<String, ReporterModule>,
}

impl ReporterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, name: impl Into<String>, module: ReporterModule) -> Self {
        self.modules.insert(name.into(), module);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Whether `name` should be loaded through this registry
    pub fn handles(&self, name: &str) -> bool {
        self.contains(name) || is_reporter_path(name)
    }

    pub async fn load(&self, reference: &str, cwd: &Path) -> Result<ReporterModule, ReporterError> {
        if let Some(module) = self.modules.get(reference) {
            return Ok(module.clone());
        }

        let path = cwd.join(reference);
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| ReporterError::Load {
                reference: reference.to_string(),
                message: format!("{}: {}", path.display(), e),
            })?;

        if metadata.is_file() && is_executable(&metadata, &path) {
            info!("Using reporter command {}", path.display());
            let reporter: Arc<dyn Reporter> = Arc::new(CommandReporter::new(path));
            Ok(ReporterModule::new()
                .with_named(NAMED_REPORTER_EXPORT, ReporterExport::Instance(reporter)))
        } else {
            Ok(ReporterModule::new().with_default(ReporterExport::Opaque(format!(
                "{} is not an executable file",
                path.display()
            ))))
        }
    }

    /// Load and resolve in one step
    pub async fn build(
        &self,
        reference: &str,
        cwd: &Path,
        artifacts_dir: &Path,
    ) -> Result<Arc<dyn Reporter>, ReporterError> {
        self.load(reference, cwd).await?.resolve(reference, artifacts_dir)
    }
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata, _path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata, path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref(),
        Some("exe" | "bat" | "cmd")
    )
}

/// External program that receives the run summary as JSON on stdin.
///
/// Only completion is forwarded; a non-zero exit fails the reporter.
#[derive(Clone, Debug)]
pub struct CommandReporter {
    program: PathBuf,
    name: String,
}

impl CommandReporter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let name = program.display().to_string();
        Self { program, name }
    }
}

#[async_trait]
impl Reporter for CommandReporter {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_start(&self, _suites: &[Suite]) {}

    fn on_suite_complete(&self, _suite: &Suite, _result: &SuiteResult) {}

    async fn on_complete(&self, results: &AggregatedResults) -> anyhow::Result<()> {
        let json = serde_json::to_vec(&Summary::new(results)).context("Failed to serialize summary")?;

        let mut child = Command::new(&self.program)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start reporter {}", self.name))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&json)
                .await
                .with_context(|| format!("Failed to send summary to {}", self.name))?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            anyhow::bail!(
                "Reporter {} exited with {}: {}",
                self.name,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}
