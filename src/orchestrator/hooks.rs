//! Lifecycle hooks
//!
//! Suite hooks may return a guard verdict that fails the suite; run hooks
//! only succeed or error.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::config::HooksConfig;
use crate::executor::shell_command;
use crate::models::{AggregatedResults, Suite, SuiteResult};

/// Return value of a suite hook
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum HookOutcome {
    /// No opinion; the suite proceeds untouched
    #[default]
    Void,
    Guard {
        ok: bool,
        error: Option<String>,
    },
}

impl HookOutcome {
    pub fn pass() -> Self {
        HookOutcome::Guard {
            ok: true,
            error: None,
        }
    }

    pub fn reject(error: impl Into<String>) -> Self {
        HookOutcome::Guard {
            ok: false,
            error: Some(error.into()),
        }
    }

    /// `Some(message)` when the guard failed the suite
    pub fn rejection(&self) -> Option<Option<&str>> {
        match self {
            HookOutcome::Guard { ok: false, error } => Some(error.as_deref()),
            _ => None,
        }
    }
}

/// Callbacks around a run and each suite
#[async_trait]
pub trait LifecycleHooks: Send + Sync {
    async fn before_all(&self) -> Result<()> {
        Ok(())
    }

    async fn after_all(&self, _results: &AggregatedResults) -> Result<()> {
        Ok(())
    }

    async fn before_suite(&self, _suite: &Suite) -> HookOutcome {
        HookOutcome::Void
    }

    async fn after_suite(&self, _suite: &Suite, _result: &SuiteResult) -> HookOutcome {
        HookOutcome::Void
    }
}

/// Hooks that do nothing
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl LifecycleHooks for NoHooks {}

/// Hooks backed by shell commands from the config file.
///
/// Suite hooks see `TESTFOLD_SUITE` (and, after the suite,
/// `TESTFOLD_SUITE_SUCCESS`); a non-zero exit rejects the suite with the
/// command's stderr as the reason.
#[derive(Clone, Debug)]
pub struct CommandHooks {
    config: HooksConfig,
    cwd: PathBuf,
}

impl CommandHooks {
    pub fn new(config: HooksConfig, cwd: impl Into<PathBuf>) -> Self {
        Self {
            config,
            cwd: cwd.into(),
        }
    }

    async fn run(&self, command: &str, env: &[(&str, String)]) -> Result<(bool, String)> {
        debug!("Running hook: {}", command);
        let mut cmd = shell_command(command);
        cmd.current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in env {
            cmd.env(key, value);
        }

        let output = cmd
            .output()
            .await
            .with_context(|| format!("Failed to run hook: {command}"))?;
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Ok((output.status.success(), stderr))
    }

    async fn guard(&self, command: &str, env: &[(&str, String)]) -> HookOutcome {
        match self.run(command, env).await {
            Ok((true, _)) => HookOutcome::pass(),
            Ok((false, stderr)) if stderr.is_empty() => HookOutcome::Guard {
                ok: false,
                error: None,
            },
            Ok((false, stderr)) => HookOutcome::reject(stderr),
            Err(e) => HookOutcome::reject(format!("{e:#}")),
        }
    }
}

#[async_trait]
impl LifecycleHooks for CommandHooks {
    async fn before_all(&self) -> Result<()> {
        let Some(command) = &self.config.before_all else {
            return Ok(());
        };
        let (ok, stderr) = self.run(command, &[]).await?;
        if !ok {
            bail!("'{}' failed: {}", command, stderr);
        }
        Ok(())
    }

    async fn after_all(&self, results: &AggregatedResults) -> Result<()> {
        let Some(command) = &self.config.after_all else {
            return Ok(());
        };
        let env = [
            ("TESTFOLD_SUCCESS", results.success.to_string()),
            ("TESTFOLD_EXIT_CODE", results.exit_code.code().to_string()),
        ];
        let (ok, stderr) = self.run(command, &env).await?;
        if !ok {
            bail!("'{}' failed: {}", command, stderr);
        }
        Ok(())
    }

    async fn before_suite(&self, suite: &Suite) -> HookOutcome {
        match &self.config.before_suite {
            Some(command) => {
                self.guard(command, &[("TESTFOLD_SUITE", suite.name.clone())])
                    .await
            }
            None => HookOutcome::Void,
        }
    }

    async fn after_suite(&self, suite: &Suite, result: &SuiteResult) -> HookOutcome {
        match &self.config.after_suite {
            Some(command) => {
                let env = [
                    ("TESTFOLD_SUITE", suite.name.clone()),
                    ("TESTFOLD_SUITE_SUCCESS", result.success.to_string()),
                ];
                self.guard(command, &env).await
            }
            None => HookOutcome::Void,
        }
    }
}
