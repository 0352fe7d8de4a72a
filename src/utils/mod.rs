//! Utility modules

pub mod ansi;
pub mod files;
pub mod logger;
pub mod path_resolver;
pub mod timer;

pub use ansi::strip_ansi;
pub use files::{clean_suite_artifacts, sanitize_filename, SuitePaths};
pub use logger::{init_logger, LogLevel};
pub use timer::{format_duration, Timer};
