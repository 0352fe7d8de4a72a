//! Runner facade
//!
//! Loads the config, prepares a run (artifacts, env files, reporters, hooks)
//! and hands it to the orchestrator.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::env::load_env_file;
use crate::config::{load_config, Config};
use crate::executor::{build_command_line, FilterOptions, OutputCallback, DEFAULT_KILL_GRACE};
use crate::models::AggregatedResults;
use crate::orchestrator::{CommandHooks, LifecycleHooks, Orchestrator, OrchestratorOptions};
use crate::reporters::{create_reporters, ReporterRegistry};
use crate::utils::files::clean_suite_artifacts;

/// Per-invocation overrides on top of the config file
#[derive(Clone, Default)]
pub struct RunOptions {
    pub environment: Option<String>,
    pub no_parallel: bool,
    pub fail_fast: bool,
    /// Replaces the configured reporters when set
    pub reporters: Option<Vec<String>>,
    pub filters: FilterOptions,
    pub pass_through: Vec<String>,
    pub kill_grace_period: Option<Duration>,
    pub on_output: Option<OutputCallback>,
}

/// A suite and the command line it would run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedSuite {
    pub name: String,
    pub command_line: String,
}

/// Entry point for running a configured project
pub struct TestRunner {
    config: Config,
    cwd: PathBuf,
    reporter_registry: ReporterRegistry,
}

impl TestRunner {
    pub fn new(config: Config, cwd: impl Into<PathBuf>) -> Self {
        Self {
            config,
            cwd: cwd.into(),
            reporter_registry: ReporterRegistry::new(),
        }
    }

    /// Reporters registered in code, selectable by name from the config
    pub fn with_reporter_registry(mut self, registry: ReporterRegistry) -> Self {
        self.reporter_registry = registry;
        self
    }

    /// Load the config from `path`, or from the standard locations under `cwd`
    pub fn from_config_file(path: Option<&Path>, cwd: impl Into<PathBuf>) -> Result<Self> {
        let cwd = cwd.into();
        let config = load_config(path, &cwd)?;
        Ok(Self::new(config, cwd))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Config with the CLI overrides applied
    fn effective_config(&self, options: &RunOptions) -> Config {
        let mut config = self.config.clone();
        if options.no_parallel {
            config.parallel = false;
        }
        if options.fail_fast {
            config.fail_fast = true;
        }
        if let Some(reporters) = &options.reporters {
            config.reporters = reporters.clone();
        }
        config
    }

    fn tests_dir(&self) -> PathBuf {
        self.cwd.join(&self.config.tests_dir)
    }

    /// Run the selected suites (all when `suite_names` is empty)
    pub async fn run(&self, suite_names: &[String], options: RunOptions) -> Result<AggregatedResults> {
        let config = self.effective_config(&options);

        let env_file_vars = match &options.environment {
            Some(environment) => {
                let loaded = load_env_file(environment, &self.cwd);
                match &loaded.loaded_file {
                    Some(file) => info!("Loaded environment '{}' from {}", environment, file.display()),
                    None => debug!("No env file for environment '{}'", environment),
                }
                loaded.env
            }
            None => Default::default(),
        };

        let artifacts_dir = self.cwd.join(&config.artifacts_dir);
        let reporters = create_reporters(
            &config.reporters,
            &artifacts_dir,
            &self.cwd,
            &self.reporter_registry,
        )
        .await
        .context("Failed to load reporters")?;
        let hooks: Option<Arc<dyn LifecycleHooks>> = if config.hooks.is_empty() {
            None
        } else {
            Some(Arc::new(CommandHooks::new(config.hooks.clone(), &self.cwd)))
        };

        let orchestrator_options = OrchestratorOptions::new(&self.cwd)
            .with_environment(options.environment.clone())
            .with_env_file_vars(env_file_vars)
            .with_pass_through(options.pass_through.clone())
            .with_filters(options.filters.clone())
            .with_kill_grace_period(options.kill_grace_period.unwrap_or(DEFAULT_KILL_GRACE))
            .with_output_callback(options.on_output.clone());

        let mut orchestrator =
            Orchestrator::new(config, orchestrator_options).with_reporters(reporters);
        if let Some(hooks) = hooks {
            orchestrator = orchestrator.with_hooks(hooks);
        }

        let selected = orchestrator.select_suites(suite_names)?;
        let config = orchestrator.config();
        clean_suite_artifacts(&selected, &self.cwd, &config.artifacts_dir)
            .await
            .context("Failed to clean artifacts")?;

        Ok(orchestrator.run(suite_names).await?)
    }

    /// Command lines for the selected suites, without running anything
    pub fn plan(&self, suite_names: &[String], options: &RunOptions) -> Result<Vec<PlannedSuite>> {
        let orchestrator = Orchestrator::new(
            self.effective_config(options),
            OrchestratorOptions::new(&self.cwd),
        );
        let tests_dir = self.tests_dir();

        Ok(orchestrator
            .select_suites(suite_names)?
            .iter()
            .map(|suite| PlannedSuite {
                name: suite.name.clone(),
                command_line: build_command_line(
                    suite,
                    &options.filters,
                    &options.pass_through,
                    Some(&tests_dir),
                ),
            })
            .collect())
    }
}
