//! Suite orchestration
//!
//! Drives one executor and one parser invocation per selected suite, applies
//! the lifecycle hooks and guards, and folds the results into a single
//! semantic outcome.

mod environment;
pub mod hooks;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::executor::{self, ExecuteOptions, FilterOptions, OutputCallback, DEFAULT_KILL_GRACE};
use crate::models::{AggregatedResults, ErrorCategory, FailureDetail, ParseResult, Suite, SuiteResult};
use crate::parser::custom::{ModuleLoader, ParserRegistry};
use crate::parser::{parse_error_result, parser_for, Parser};
use crate::reporters::Reporter;
use crate::utils::files::SuitePaths;

pub use environment::{compose_env, BASE_URL_VAR};
pub use hooks::{CommandHooks, HookOutcome, LifecycleHooks, NoHooks};

pub const BEFORE_SUITE_GUARD: &str = "beforeSuite Guard";
pub const AFTER_SUITE_GUARD: &str = "afterSuite Guard";

const BEFORE_SUITE_DEFAULT_ERROR: &str = "beforeSuite guard failed";
const AFTER_SUITE_DEFAULT_ERROR: &str = "afterSuite guard failed";

/// Run-level errors; anything that happens inside a suite becomes a result
#[derive(Error, Debug)]
pub enum RunError {
    #[error("No suites configured")]
    NoSuitesConfigured,

    #[error("No suites match: {0}")]
    NoMatchingSuites(String),

    #[error("{hook} hook failed: {message}")]
    Hook { hook: &'static str, message: String },
}

/// Per-run inputs that do not come from the config file
#[derive(Clone)]
pub struct OrchestratorOptions {
    pub cwd: PathBuf,
    /// Active named environment (`--env`)
    pub environment: Option<String>,
    /// Variables loaded from the environment's `.env` file
    pub env_file_vars: BTreeMap<String, String>,
    pub pass_through: Vec<String>,
    pub filters: FilterOptions,
    pub kill_grace_period: Duration,
    pub on_output: Option<OutputCallback>,
}

impl OrchestratorOptions {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            environment: None,
            env_file_vars: BTreeMap::new(),
            pass_through: Vec::new(),
            filters: FilterOptions::default(),
            kill_grace_period: DEFAULT_KILL_GRACE,
            on_output: None,
        }
    }

    pub fn with_environment(mut self, environment: Option<String>) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_env_file_vars(mut self, vars: BTreeMap<String, String>) -> Self {
        self.env_file_vars = vars;
        self
    }

    pub fn with_pass_through(mut self, args: Vec<String>) -> Self {
        self.pass_through = args;
        self
    }

    pub fn with_filters(mut self, filters: FilterOptions) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_kill_grace_period(mut self, grace: Duration) -> Self {
        self.kill_grace_period = grace;
        self
    }

    pub fn with_output_callback(mut self, callback: Option<OutputCallback>) -> Self {
        self.on_output = callback;
        self
    }
}

/// Runs the configured suites and aggregates their outcome
pub struct Orchestrator {
    config: Config,
    options: OrchestratorOptions,
    reporters: Vec<Box<dyn Reporter>>,
    hooks: Arc<dyn LifecycleHooks>,
    module_loader: Arc<dyn ModuleLoader>,
    /// Parsers by suite name; custom loaders keep their loaded module here
    parsers: HashMap<String, Arc<dyn Parser>>,
}

impl Orchestrator {
    pub fn new(config: Config, options: OrchestratorOptions) -> Self {
        let module_loader: Arc<dyn ModuleLoader> = Arc::new(ParserRegistry::new());
        let parsers = build_parsers(&config, &options.cwd, &module_loader);
        Self {
            config,
            options,
            reporters: Vec::new(),
            hooks: Arc::new(NoHooks),
            module_loader,
            parsers,
        }
    }

    pub fn with_reporters(mut self, reporters: Vec<Box<dyn Reporter>>) -> Self {
        self.reporters = reporters;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn LifecycleHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_module_loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.parsers = build_parsers(&self.config, &self.options.cwd, &loader);
        self.module_loader = loader;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Configured suites matching `names` case-insensitively, in config order.
    /// No names selects every suite.
    pub fn select_suites(&self, names: &[String]) -> Result<Vec<Suite>, RunError> {
        if self.config.suites.is_empty() {
            return Err(RunError::NoSuitesConfigured);
        }
        if names.is_empty() {
            return Ok(self.config.suites.clone());
        }

        let selected: Vec<Suite> = self
            .config
            .suites
            .iter()
            .filter(|s| names.iter().any(|n| s.matches_name(n)))
            .cloned()
            .collect();
        if selected.is_empty() {
            return Err(RunError::NoMatchingSuites(names.join(", ")));
        }
        Ok(selected)
    }

    /// Run the selected suites and return the aggregated outcome
    pub async fn run(&self, suite_names: &[String]) -> Result<AggregatedResults, RunError> {
        let suites = self.select_suites(suite_names)?;
        info!(
            "Running {} suite(s) {}",
            suites.len(),
            if self.config.parallel { "in parallel" } else { "sequentially" }
        );

        for reporter in &self.reporters {
            reporter.on_start(&suites);
        }

        self.hooks
            .before_all()
            .await
            .map_err(|e| RunError::Hook {
                hook: "beforeAll",
                message: format!("{e:#}"),
            })?;

        let results = if self.config.parallel {
            join_all(suites.iter().map(|suite| self.run_suite(suite))).await
        } else {
            self.run_sequential(&suites).await
        };

        let aggregated = AggregatedResults::from_suites(results);
        info!(
            "Run finished: {} passed, {} failed, {} skipped, exit code {}",
            aggregated.totals.passed,
            aggregated.totals.failed,
            aggregated.totals.skipped,
            aggregated.exit_code
        );

        self.hooks
            .after_all(&aggregated)
            .await
            .map_err(|e| RunError::Hook {
                hook: "afterAll",
                message: format!("{e:#}"),
            })?;

        for reporter in &self.reporters {
            if let Err(e) = reporter.on_complete(&aggregated).await {
                warn!("Reporter {} failed: {:#}", reporter.name(), e);
            }
        }

        Ok(aggregated)
    }

    async fn run_sequential(&self, suites: &[Suite]) -> Vec<SuiteResult> {
        let mut results = Vec::with_capacity(suites.len());
        for suite in suites {
            let result = self.run_suite(suite).await;
            let stop = self.config.fail_fast && !result.success;
            results.push(result);
            if stop {
                info!("Fail-fast: stopping after {}", suite.name);
                break;
            }
        }
        results
    }

    /// One suite end to end. Never fails; every problem becomes a result.
    pub async fn run_suite(&self, suite: &Suite) -> SuiteResult {
        let paths = SuitePaths::resolve(suite, &self.options.cwd, &self.config.artifacts_dir);

        let before = self.hooks.before_suite(suite).await;
        if let Some(error) = before.rejection() {
            let message = error.unwrap_or(BEFORE_SUITE_DEFAULT_ERROR);
            warn!("{}: beforeSuite guard rejected: {}", suite.name, message);
            let result = guard_rejected(suite, paths, message);
            self.notify_suite_complete(suite, &result);
            return result;
        }

        let env = compose_env(
            suite,
            &self.options.env_file_vars,
            self.options.environment.as_deref(),
            &self.options.cwd,
        );
        let exec_options = ExecuteOptions::new(&self.options.cwd, &paths.log_file)
            .with_env(env)
            .with_timeout(suite.timeout())
            .with_kill_grace_period(self.options.kill_grace_period)
            .with_pass_through(self.options.pass_through.clone())
            .with_tests_dir(Some(self.options.cwd.join(&self.config.tests_dir)))
            .with_filters(self.options.filters.clone())
            .with_output_callback(self.options.on_output.clone());
        let exec = executor::execute(suite, &exec_options).await;

        let (parse, parse_failed) = self.parse(suite, &paths).await;
        let duration_ms = if parse.duration_ms > 0 {
            parse.duration_ms
        } else {
            exec.duration.as_millis() as u64
        };

        let mut result = SuiteResult::from_parse(
            suite.name.clone(),
            parse,
            paths.log_file,
            paths.result_file,
        );
        result.duration_ms = duration_ms;
        result.error_category = Some(if exec.timed_out() {
            ErrorCategory::Timeout
        } else if parse_failed {
            ErrorCategory::InfraError
        } else if result.failed > 0 || !result.success {
            // A parser may veto success with zero counted failures.
            ErrorCategory::TestFailure
        } else {
            ErrorCategory::None
        });

        let after = self.hooks.after_suite(suite, &result).await;
        if let Some(error) = after.rejection() {
            let message = error.unwrap_or(AFTER_SUITE_DEFAULT_ERROR);
            warn!("{}: afterSuite guard rejected: {}", suite.name, message);
            apply_after_guard(&mut result, message);
        }

        debug!("{}: {:?}", suite.name, result.error_category);
        self.notify_suite_complete(suite, &result);
        result
    }

    /// Parse the suite's artifact; the flag is set when the parser itself failed
    async fn parse(&self, suite: &Suite, paths: &SuitePaths) -> (ParseResult, bool) {
        let parser = match self.parsers.get(&suite.name) {
            Some(parser) => Arc::clone(parser),
            None => match parser_for(suite, &self.options.cwd, Arc::clone(&self.module_loader)) {
                Ok(parser) => parser,
                Err(e) => {
                    warn!("{}: {}", suite.name, e);
                    return (parse_error_result(&paths.result_file, &e), true);
                }
            },
        };

        match parser.parse(&paths.result_file, Some(&paths.log_file)).await {
            Ok(parse) => (parse, false),
            Err(e) => {
                warn!("{}: failed to parse {}: {}", suite.name, paths.result_file.display(), e);
                (parse_error_result(&paths.result_file, &e), true)
            }
        }
    }

    fn notify_suite_complete(&self, suite: &Suite, result: &SuiteResult) {
        for reporter in &self.reporters {
            reporter.on_suite_complete(suite, result);
        }
    }
}

fn build_parsers(
    config: &Config,
    cwd: &Path,
    loader: &Arc<dyn ModuleLoader>,
) -> HashMap<String, Arc<dyn Parser>> {
    config
        .suites
        .iter()
        .filter_map(|suite| {
            parser_for(suite, cwd, Arc::clone(loader))
                .ok()
                .map(|parser| (suite.name.clone(), parser))
        })
        .collect()
}

fn guard_rejected(suite: &Suite, paths: SuitePaths, message: &str) -> SuiteResult {
    let mut result = SuiteResult::from_parse(
        suite.name.clone(),
        ParseResult::single_failure(FailureDetail::new(BEFORE_SUITE_GUARD, "", message)),
        paths.log_file,
        paths.result_file,
    );
    result.duration_ms = 0;
    result.error_category = Some(ErrorCategory::InfraError);
    result
}

fn apply_after_guard(result: &mut SuiteResult, message: &str) {
    result.success = false;
    result.failed += 1;
    result
        .failures
        .push(FailureDetail::new(AFTER_SUITE_GUARD, "", message));
    result.error_category = Some(
        result
            .error_category
            .map_or(ErrorCategory::InfraError, |c| c.max(ErrorCategory::InfraError)),
    );
}
