//! Command line construction
//!
//! The suite's command is kept as written and extra arguments are appended
//! shell-quoted, since the whole line runs through a shell.

use std::path::Path;

use tracing::debug;

use crate::models::{Suite, SuiteKind};
use crate::utils::path_resolver::{resolve_path_prefix, ResolveOptions};

/// Test selection flags shared by every suite in a run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterOptions {
    /// Only run tests whose name matches
    pub grep: Option<String>,
    /// Skip tests whose name matches
    pub grep_invert: Option<String>,
    /// Only run this test file
    pub file: Option<String>,
}

impl FilterOptions {
    pub fn is_empty(&self) -> bool {
        self.grep.is_none() && self.grep_invert.is_none() && self.file.is_none()
    }
}

/// Framework-specific arguments for the name and file filters
pub fn filter_args(kind: SuiteKind, filters: &FilterOptions) -> Vec<String> {
    let mut args = Vec::new();

    match kind {
        SuiteKind::Jest => {
            // Jest has a single name pattern; an inverted grep becomes a negative lookahead.
            let pattern = match (&filters.grep, &filters.grep_invert) {
                (Some(grep), Some(invert)) => Some(format!("^(?!.*(?:{invert})).*(?:{grep})")),
                (Some(grep), None) => Some(grep.clone()),
                (None, Some(invert)) => Some(format!("^(?!.*(?:{invert}))")),
                (None, None) => None,
            };
            if let Some(pattern) = pattern {
                args.push(format!("--testNamePattern={pattern}"));
            }
        }
        SuiteKind::Playwright | SuiteKind::Custom => {
            if let Some(grep) = &filters.grep {
                args.push(format!("--grep={grep}"));
            }
            if let Some(invert) = &filters.grep_invert {
                args.push(format!("--grep-invert={invert}"));
            }
        }
    }

    if let Some(file) = &filters.file {
        args.push(file.clone());
    }
    args
}

/// Worker-count flag for frameworks that have one
pub fn worker_args(kind: SuiteKind, workers: Option<u32>) -> Vec<String> {
    match (kind, workers) {
        (SuiteKind::Jest, Some(n)) => vec![format!("--maxWorkers={n}")],
        (SuiteKind::Playwright, Some(n)) => vec![format!("--workers={n}")],
        _ => Vec::new(),
    }
}

/// Whether a pass-through token may be treated as a file prefix
pub fn is_resolvable_token(token: &str) -> bool {
    !token.starts_with('-')
        && !token.contains('/')
        && !token.contains('\\')
        && token.chars().any(|c| c.is_alphabetic())
}

/// Rewrite bare words that name exactly one test file under `tests_dir`
pub fn resolve_pass_through(args: &[String], tests_dir: Option<&Path>) -> Vec<String> {
    let Some(tests_dir) = tests_dir else {
        return args.to_vec();
    };
    let options = ResolveOptions::new(tests_dir);

    args.iter()
        .map(|arg| {
            if !is_resolvable_token(arg) {
                return arg.clone();
            }
            let mut matches = resolve_path_prefix(arg, &options);
            if matches.len() == 1 {
                let resolved = matches.remove(0).to_string_lossy().into_owned();
                debug!("Resolved '{}' to {}", arg, resolved);
                resolved
            } else {
                arg.clone()
            }
        })
        .collect()
}

/// Full shell line for a suite: command, filters, workers, pass-through
pub fn build_command_line(
    suite: &Suite,
    filters: &FilterOptions,
    pass_through: &[String],
    tests_dir: Option<&Path>,
) -> String {
    let mut extra = filter_args(suite.kind, filters);
    extra.extend(worker_args(suite.kind, suite.workers));
    extra.extend(resolve_pass_through(pass_through, tests_dir));

    let mut line = suite.command.trim().to_string();
    for arg in &extra {
        line.push(' ');
        line.push_str(&shell_words::quote(arg));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_filter_args_per_kind() {
        let filters = FilterOptions {
            grep: Some("login".to_string()),
            grep_invert: None,
            file: Some("auth.spec.ts".to_string()),
        };
        assert_eq!(
            filter_args(SuiteKind::Jest, &filters),
            vec!["--testNamePattern=login", "auth.spec.ts"]
        );
        assert_eq!(
            filter_args(SuiteKind::Playwright, &filters),
            vec!["--grep=login", "auth.spec.ts"]
        );

        let invert = FilterOptions {
            grep_invert: Some("slow".to_string()),
            ..Default::default()
        };
        assert_eq!(filter_args(SuiteKind::Custom, &invert), vec!["--grep-invert=slow"]);
        assert_eq!(
            filter_args(SuiteKind::Jest, &invert),
            vec!["--testNamePattern=^(?!.*(?:slow))"]
        );
    }

    #[test]
    fn test_worker_args() {
        assert_eq!(worker_args(SuiteKind::Jest, Some(4)), vec!["--maxWorkers=4"]);
        assert_eq!(worker_args(SuiteKind::Playwright, Some(2)), vec!["--workers=2"]);
        assert!(worker_args(SuiteKind::Custom, Some(2)).is_empty());
        assert!(worker_args(SuiteKind::Jest, None).is_empty());
    }

    #[test]
    fn test_resolvable_tokens() {
        assert!(is_resolvable_token("auth"));
        assert!(!is_resolvable_token("--headed"));
        assert!(!is_resolvable_token("tests/auth"));
        assert!(!is_resolvable_token("dir\\auth"));
        assert!(!is_resolvable_token("1234"));
    }

    #[test]
    fn test_pass_through_resolution() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("auth.spec.ts"), "").unwrap();
        std::fs::write(dir.path().join("user-a.spec.ts"), "").unwrap();
        std::fs::write(dir.path().join("user-b.spec.ts"), "").unwrap();

        let args = vec![
            "auth".to_string(),
            "user".to_string(),
            "--headed".to_string(),
            "missing".to_string(),
        ];
        let resolved = resolve_pass_through(&args, Some(dir.path()));
        assert_eq!(resolved[0], dir.path().join("auth.spec.ts").to_string_lossy());
        assert_eq!(&resolved[1..], &args[1..]);

        assert_eq!(resolve_pass_through(&args, None), args);
    }

    #[test]
    fn test_build_command_line_quotes() {
        let suite = Suite::new("e2e", SuiteKind::Playwright, "npx playwright test ", "e2e.json")
            .with_workers(2);
        let filters = FilterOptions {
            grep: Some("user login".to_string()),
            ..Default::default()
        };
        let line = build_command_line(&suite, &filters, &["--headed".to_string()], None);
        assert!(line.starts_with("npx playwright test '--grep=user login' "));
        assert!(line.contains("--workers=2"));
        assert!(line.ends_with(" --headed"));
        assert_eq!(shell_words::split(&line).unwrap().len(), 6);
    }
}
