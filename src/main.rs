//! testfold - run test suites with semantic exit codes
//!
//! ## Usage
//!
//! ```bash
//! # Run every configured suite
//! testfold
//!
//! # Run selected suites against an environment
//! testfold unit e2e --env staging
//!
//! # Filter tests and forward arguments to the framework
//! testfold e2e -g "checkout" -- --headed
//!
//! # Show the commands without running them
//! testfold --dry-run
//! ```

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error};

use testfold::cli::Args;
use testfold::config::env::EnvConfig;
use testfold::executor::OutputCallback;
use testfold::models;
use testfold::utils::logger::{init_logger, LogLevel};
use testfold::{RunOptions, TestRunner};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let env_config = EnvConfig::load();

    let level = if args.verbose || args.quiet {
        args.log_level()
    } else {
        env_config
            .log_level
            .as_deref()
            .and_then(LogLevel::from_str)
            .unwrap_or(LogLevel::Info)
    };
    init_logger(level);
    if env_config.has_any() {
        debug!("TESTFOLD_* overrides: {:?}", env_config);
    }

    match run(args, env_config).await {
        Ok(code) => ExitCode::from(code.code()),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(models::ExitCode::InfraError.code())
        }
    }
}

async fn run(args: Args, env_config: EnvConfig) -> Result<models::ExitCode> {
    let cwd = std::env::current_dir().context("Failed to resolve working directory")?;
    let config_path = args
        .config
        .clone()
        .or_else(|| env_config.config_file.as_ref().map(Into::into));
    let runner = TestRunner::from_config_file(config_path.as_deref(), &cwd)?;

    let options = RunOptions {
        environment: args.env.clone().or(env_config.environment),
        no_parallel: args.no_parallel || env_config.no_parallel.unwrap_or(false),
        fail_fast: args.fail_fast,
        reporters: args.reporter_override(),
        filters: args.filters(),
        pass_through: args.pass_through.clone(),
        kill_grace_period: None,
        on_output: args.verbose.then(stream_to_stderr),
    };

    if args.dry_run {
        for planned in runner.plan(&args.suites, &options)? {
            println!("{}: {}", planned.name, planned.command_line);
        }
        return Ok(models::ExitCode::Pass);
    }

    let results = runner.run(&args.suites, options).await?;
    Ok(results.exit_code)
}

/// Mirror suite output on stderr while it runs
fn stream_to_stderr() -> OutputCallback {
    Arc::new(|chunk: &str| {
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(chunk.as_bytes());
    })
}
