//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use std::path::PathBuf;

use clap::Parser;

use crate::executor::FilterOptions;
use crate::utils::logger::LogLevel;

/// Run test suites and report one semantic exit code
#[derive(Parser, Debug)]
#[command(name = "testfold")]
#[command(version)]
#[command(about = "Run test suites in parallel with semantic exit codes")]
#[command(
    after_help = "Exit codes: 0 pass, 1 test failure, 2 infrastructure error, 3 timeout"
)]
pub struct Args {
    /// Suites to run (case-insensitive; default: all)
    #[arg(value_name = "SUITE")]
    pub suites: Vec<String>,

    /// Config file (default: search testfold.yaml, testfold.yml, testfold.json, ...)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Named environment; loads .env.<name> and the suites' overrides
    #[arg(short, long)]
    pub env: Option<String>,

    /// Run suites one at a time in config order
    #[arg(long)]
    pub no_parallel: bool,

    /// Stop scheduling suites after the first failure (sequential mode)
    #[arg(long)]
    pub fail_fast: bool,

    /// Reporters to use (console, json, markdown-failures, text, summary-log,
    /// timing, timing-text or a path to an executable); repeatable or comma separated
    #[arg(short, long = "reporter", value_delimiter = ',')]
    pub reporters: Vec<String>,

    /// Only run tests whose name matches this pattern
    #[arg(short, long)]
    pub grep: Option<String>,

    /// Skip tests whose name matches this pattern
    #[arg(long)]
    pub grep_invert: Option<String>,

    /// Only run this test file
    #[arg(short, long)]
    pub file: Option<String>,

    /// Print the resolved commands without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Arguments forwarded to every suite command
    #[arg(last = true, value_name = "ARGS")]
    pub pass_through: Vec<String>,
}

impl Args {
    pub fn filters(&self) -> FilterOptions {
        FilterOptions {
            grep: self.grep.clone(),
            grep_invert: self.grep_invert.clone(),
            file: self.file.clone(),
        }
    }

    pub fn log_level(&self) -> LogLevel {
        LogLevel::from_flags(self.verbose, self.quiet)
    }

    /// Reporter override, `None` to use the configured list
    pub fn reporter_override(&self) -> Option<Vec<String>> {
        let names: Vec<String> = self
            .reporters
            .iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        (!names.is_empty()).then_some(names)
    }
}
