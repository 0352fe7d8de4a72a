//! Configuration module
//!
//! Handles loading and validating the run configuration.

pub mod env;
mod file;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::Suite;

pub use file::{find_config, load_config, CONFIG_LOCATIONS};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("No config file found. Create one of: {}", CONFIG_LOCATIONS.join(", "))]
    NoConfigFile,

    #[error("Failed to parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid config:\n{}", .0.iter().map(|e| format!("  - {e}")).collect::<Vec<_>>().join("\n"))]
    Invalid(Vec<String>),
}

/// Shell commands run at lifecycle points
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HooksConfig {
    #[serde(default)]
    pub before_all: Option<String>,
    #[serde(default)]
    pub after_all: Option<String>,
    #[serde(default)]
    pub before_suite: Option<String>,
    #[serde(default)]
    pub after_suite: Option<String>,
}

impl HooksConfig {
    pub fn is_empty(&self) -> bool {
        self.before_all.is_none()
            && self.after_all.is_none()
            && self.before_suite.is_none()
            && self.after_suite.is_none()
    }
}

/// Run configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Directory for result artifacts and logs
    pub artifacts_dir: PathBuf,

    /// Root for resolving pass-through path prefixes
    #[serde(default = "default_tests_dir")]
    pub tests_dir: PathBuf,

    /// Test suites, in execution and report order
    pub suites: Vec<Suite>,

    /// Run suites concurrently
    #[serde(default = "default_parallel")]
    pub parallel: bool,

    /// Stop scheduling after the first unsuccessful suite (sequential only)
    #[serde(default)]
    pub fail_fast: bool,

    /// Reporter names
    #[serde(default = "default_reporters")]
    pub reporters: Vec<String>,

    #[serde(default)]
    pub hooks: HooksConfig,
}

fn default_tests_dir() -> PathBuf {
    PathBuf::from("./tests")
}

fn default_parallel() -> bool {
    true
}

fn default_reporters() -> Vec<String> {
    vec![
        "console".to_string(),
        "json".to_string(),
        "markdown-failures".to_string(),
    ]
}

impl Config {
    pub fn new(artifacts_dir: impl Into<PathBuf>, suites: Vec<Suite>) -> Self {
        Self {
            artifacts_dir: artifacts_dir.into(),
            tests_dir: default_tests_dir(),
            suites,
            parallel: default_parallel(),
            fail_fast: false,
            reporters: default_reporters(),
            hooks: HooksConfig::default(),
        }
    }

    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_reporters(mut self, reporters: Vec<String>) -> Self {
        self.reporters = reporters;
        self
    }

    pub fn with_tests_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tests_dir = dir.into();
        self
    }

    /// Validate configuration, collecting every problem.
    ///
    /// `type: custom` without a parser is accepted here; it fails only the
    /// affected suite at dispatch time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.artifacts_dir.as_os_str().is_empty() {
            errors.push("artifacts_dir: must not be empty".to_string());
        }
        if self.suites.is_empty() {
            errors.push("suites: at least one suite is required".to_string());
        }

        let mut seen = HashSet::new();
        for (i, suite) in self.suites.iter().enumerate() {
            if suite.name.trim().is_empty() {
                errors.push(format!("suites.{i}.name: must not be empty"));
            } else if !seen.insert(suite.name.to_lowercase()) {
                errors.push(format!("suites.{i}.name: duplicate suite '{}'", suite.name));
            }
            if suite.command.trim().is_empty() {
                errors.push(format!("suites.{i}.command: must not be empty"));
            }
            if suite.result_file.trim().is_empty() {
                errors.push(format!("suites.{i}.result_file: must not be empty"));
            }
            let result_path = self.artifacts_dir.join(&suite.result_file);
            if suite.log_file.as_deref().is_some_and(|log| Path::new(log) == result_path) {
                errors.push(format!("suites.{i}.log_file: must differ from the result file"));
            }
            if suite.timeout_ms == Some(0) {
                errors.push(format!("suites.{i}.timeout: must be positive"));
            }
            if suite.workers == Some(0) {
                errors.push(format!("suites.{i}.workers: must be positive"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}
