//! testfold - test suite orchestration with semantic exit codes
//!
//! Runs independently configured test suites (Jest, Playwright or a custom
//! framework), enforces per-suite timeouts, normalizes their result files
//! and folds everything into one outcome:
//!
//! | Exit code | Meaning |
//! |-----------|---------|
//! | 0 | every suite passed |
//! | 1 | test failures |
//! | 2 | infrastructure error (spawn, parse, guard, config) |
//! | 3 | a suite was killed by its timeout |

pub mod cli;
pub mod config;
pub mod executor;
pub mod models;
pub mod orchestrator;
pub mod parser;
pub mod reporters;
pub mod runner;
pub mod utils;

pub use config::Config;
pub use models::{AggregatedResults, ExitCode, Suite, SuiteResult};
pub use orchestrator::{Orchestrator, OrchestratorOptions, RunError};
pub use runner::{RunOptions, TestRunner};
