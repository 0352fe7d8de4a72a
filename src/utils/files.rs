//! Artifact file helpers
//!
//! Path derivation for suite artifacts, per-suite cleanup and filename
//! sanitization.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::models::Suite;

/// Directory (under the artifacts dir) holding per-failure markdown reports
pub const FAILURES_DIR: &str = "failures";

/// Resolved on-disk locations for one suite
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SuitePaths {
    pub result_file: PathBuf,
    pub log_file: PathBuf,
}

impl SuitePaths {
    /// Result file under `cwd/artifacts_dir`; the log is explicit (relative to
    /// `cwd`) or the result path with a `.log` extension. A result file that
    /// is itself a `.log` gets its log at `<stem>.run.log`.
    pub fn resolve(suite: &Suite, cwd: &Path, artifacts_dir: &Path) -> Self {
        let result_file = cwd.join(artifacts_dir).join(&suite.result_file);
        let log_file = match &suite.log_file {
            Some(log) => cwd.join(log),
            None => {
                let derived = result_file.with_extension("log");
                if derived == result_file {
                    result_file.with_extension("run.log")
                } else {
                    derived
                }
            }
        };
        Self {
            result_file,
            log_file,
        }
    }
}

/// Lowercased, hyphenated, filesystem-safe name
pub fn sanitize_filename(name: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        if c.is_alphanumeric() || c == '_' {
            out.push(c);
        } else if (c.is_whitespace() || c == '-') && !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_matches('-');
    trimmed.chars().take(max_len).collect()
}

/// Create `path` and its parents
pub async fn ensure_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .with_context(|| format!("Failed to create directory: {}", path.display()))
}

/// Write a file, creating its parent directory first
pub async fn write_file_with_dir(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write file: {}", path.display()))
}

/// Remove the artifacts of the selected suites only and make sure the
/// artifacts directory exists. Artifacts of other suites are untouched.
pub async fn clean_suite_artifacts(suites: &[Suite], cwd: &Path, artifacts_dir: &Path) -> Result<()> {
    let root = cwd.join(artifacts_dir);
    ensure_dir(&root).await?;

    for suite in suites {
        let paths = SuitePaths::resolve(suite, cwd, artifacts_dir);
        for file in [&paths.result_file, &paths.log_file] {
            remove_if_exists(file).await?;
        }

        let failures = root.join(FAILURES_DIR).join(sanitize_filename(&suite.name, 100));
        if tokio::fs::metadata(&failures).await.is_ok() {
            tokio::fs::remove_dir_all(&failures)
                .await
                .with_context(|| format!("Failed to remove {}", failures.display()))?;
        }
        debug!("Cleaned artifacts for {}", suite.name);
    }
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}
