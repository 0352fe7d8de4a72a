//! Environment configuration
//!
//! Loads `.env` files for named environments and reads `TESTFOLD_*` process
//! variables that override CLI defaults.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::models::UrlExtractor;

/// Environment variable prefix
const ENV_PREFIX: &str = "TESTFOLD";

/// Candidate env files for a named environment, in lookup order
const ENV_FILE_PATTERNS: &[&str] = &[
    ".env.{env}",
    ".env.{env}.local",
    "env/.env.{env}",
    "config/.env.{env}",
];

/// Variables loaded from an env file
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvLoadResult {
    pub env: BTreeMap<String, String>,
    /// Path of the file the variables came from
    pub loaded_file: Option<PathBuf>,
}

/// Load the first env file found for `environment` (e.g. "staging")
pub fn load_env_file(environment: &str, cwd: &Path) -> EnvLoadResult {
    for pattern in ENV_FILE_PATTERNS {
        let path = cwd.join(pattern.replace("{env}", environment));
        if !path.is_file() {
            continue;
        }
        match read_vars(&path) {
            Ok(env) => {
                debug!("Loaded {} variables from {}", env.len(), path.display());
                return EnvLoadResult {
                    env,
                    loaded_file: Some(path),
                };
            }
            Err(e) => debug!("Skipping env file {}: {e:#}", path.display()),
        }
    }
    EnvLoadResult::default()
}

/// Load an env file from an explicit path; missing or unreadable yields nothing
pub fn load_env_file_from_path(env_file: &str, cwd: &Path) -> EnvLoadResult {
    let path = cwd.join(env_file);
    match read_vars(&path) {
        Ok(env) => EnvLoadResult {
            env,
            loaded_file: Some(path),
        },
        Err(_) => EnvLoadResult::default(),
    }
}

/// Raw env file content for URL extraction; missing yields an empty string
pub fn read_env_file_content(env_file: &str, cwd: &Path) -> String {
    std::fs::read_to_string(cwd.join(env_file)).unwrap_or_default()
}

/// Run `extractor` against the content of `env_file`
pub fn extract_url(env_file: &str, extractor: &UrlExtractor, cwd: &Path) -> Option<String> {
    let content = read_env_file_content(env_file, cwd);
    if content.is_empty() {
        return None;
    }
    extractor(&content)
}

fn read_vars(path: &Path) -> Result<BTreeMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read env file: {}", path.display()))?;
    Ok(parse_dotenv(&content))
}

/// Parse dotenv syntax into a flat map; later keys win
pub fn parse_dotenv(content: &str) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    for line in content.lines() {
        if let Some((key, value)) = parse_line(line) {
            vars.insert(key, value);
        }
    }
    vars
}

/// Value of the first `key=value` line for `key`
pub fn lookup_key(content: &str, key: &str) -> Option<String> {
    content
        .lines()
        .filter_map(parse_line)
        .find(|(k, _)| k == key)
        .map(|(_, v)| v)
        .filter(|v| !v.is_empty())
}

fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, raw) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some((key.to_string(), parse_value(raw.trim())))
}

fn parse_value(raw: &str) -> String {
    if let Some(inner) = raw.strip_prefix('"') {
        let inner = inner.rfind('"').map(|end| &inner[..end]).unwrap_or(inner);
        return inner.replace("\\n", "\n").replace("\\\"", "\"");
    }
    if let Some(inner) = raw.strip_prefix('\'') {
        return inner
            .rfind('\'')
            .map(|end| &inner[..end])
            .unwrap_or(inner)
            .to_string();
    }
    match raw.find(" #") {
        Some(idx) => raw[..idx].trim_end().to_string(),
        None => raw.to_string(),
    }
}

/// Overrides read from `TESTFOLD_*` process variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Config file from TESTFOLD_CONFIG
    pub config_file: Option<String>,
    /// Environment name from TESTFOLD_ENV
    pub environment: Option<String>,
    /// Log level from TESTFOLD_LOG
    pub log_level: Option<String>,
    /// Sequential mode from TESTFOLD_NO_PARALLEL
    pub no_parallel: Option<bool>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            config_file: get_env("CONFIG"),
            environment: get_env("ENV"),
            log_level: get_env("LOG"),
            no_parallel: get_env_bool("NO_PARALLEL"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.config_file.is_some()
            || self.environment.is_some()
            || self.log_level.is_some()
            || self.no_parallel.is_some()
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}
