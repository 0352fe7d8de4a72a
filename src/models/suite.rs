//! Suite configuration models
//!
//! Defines the test suites handed to the orchestrator and the framework kinds
//! it knows how to drive.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Test framework backing a suite
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuiteKind {
    Jest,
    Playwright,
    Custom,
}

impl SuiteKind {
    /// Get framework display name
    pub fn name(&self) -> &'static str {
        match self {
            SuiteKind::Jest => "Jest",
            SuiteKind::Playwright => "Playwright",
            SuiteKind::Custom => "Custom",
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<SuiteKind> {
        match s.to_lowercase().as_str() {
            "jest" => Some(SuiteKind::Jest),
            "playwright" | "pw" => Some(SuiteKind::Playwright),
            "custom" => Some(SuiteKind::Custom),
            _ => None,
        }
    }
}

impl fmt::Display for SuiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Extracts a base URL from the raw content of an env file
pub type UrlExtractor = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Per-environment overrides for a suite
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SuiteEnvironment {
    /// Static base URL exported as `TEST_BASE_URL`
    #[serde(default)]
    pub base_url: Option<String>,

    /// Env file consulted by the URL extractor
    #[serde(default)]
    pub env_file: Option<String>,

    /// Variables that win over every other layer
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Key whose value in `env_file` becomes `TEST_BASE_URL`
    #[serde(default)]
    pub url_key: Option<String>,

    #[serde(skip)]
    pub url_extractor: Option<UrlExtractor>,
}

impl SuiteEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_env_file(mut self, path: impl Into<String>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_url_key(mut self, key: impl Into<String>) -> Self {
        self.url_key = Some(key.into());
        self
    }

    pub fn with_url_extractor<F>(mut self, extractor: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.url_extractor = Some(Arc::new(extractor));
        self
    }

    /// The effective extractor: an explicit function, else one built from `url_key`
    pub fn extractor(&self) -> Option<UrlExtractor> {
        if let Some(extractor) = &self.url_extractor {
            return Some(Arc::clone(extractor));
        }
        self.url_key.as_ref().map(|key| {
            let key = key.clone();
            Arc::new(move |content: &str| crate::config::env::lookup_key(content, &key))
                as UrlExtractor
        })
    }
}

impl fmt::Debug for SuiteEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuiteEnvironment")
            .field("base_url", &self.base_url)
            .field("env_file", &self.env_file)
            .field("env", &self.env)
            .field("url_key", &self.url_key)
            .field("url_extractor", &self.url_extractor.as_ref().map(|_| ".."))
            .finish()
    }
}

/// One independently configured test command
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Suite {
    /// Display name, unique within a run
    pub name: String,

    /// Framework that produces the result artifact
    #[serde(rename = "type")]
    pub kind: SuiteKind,

    /// Shell command that runs the tests
    pub command: String,

    /// Result artifact, relative to the artifacts directory
    pub result_file: String,

    /// Log file (derived from `result_file` when absent)
    #[serde(default)]
    pub log_file: Option<String>,

    /// Timeout in milliseconds
    #[serde(default, rename = "timeout")]
    pub timeout_ms: Option<u64>,

    /// Worker count forwarded to the framework
    #[serde(default)]
    pub workers: Option<u32>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Named environment overrides (e.g. "staging", "prod")
    #[serde(default)]
    pub environments: BTreeMap<String, SuiteEnvironment>,

    /// Custom parser reference (required when `type` is custom)
    #[serde(default)]
    pub parser: Option<String>,
}

impl Suite {
    pub fn new(
        name: impl Into<String>,
        kind: SuiteKind,
        command: impl Into<String>,
        result_file: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            command: command.into(),
            result_file: result_file.into(),
            log_file: None,
            timeout_ms: None,
            workers: None,
            env: BTreeMap::new(),
            environments: BTreeMap::new(),
            parser: None,
        }
    }

    pub fn with_log_file(mut self, path: impl Into<String>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    pub fn with_workers(mut self, workers: u32) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_environment(mut self, name: impl Into<String>, env: SuiteEnvironment) -> Self {
        self.environments.insert(name.into(), env);
        self
    }

    pub fn with_parser(mut self, reference: impl Into<String>) -> Self {
        self.parser = Some(reference.into());
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Case-insensitive exact match against a requested suite name
    pub fn matches_name(&self, requested: &str) -> bool {
        self.name.to_lowercase() == requested.to_lowercase()
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str() {
        assert_eq!(SuiteKind::from_str("Jest"), Some(SuiteKind::Jest));
        assert_eq!(SuiteKind::from_str("pw"), Some(SuiteKind::Playwright));
        assert_eq!(SuiteKind::from_str("mocha"), None);
    }

    #[test]
    fn test_suite_deserialize() {
        let yaml = r#"
name: Unit
type: jest
command: npx jest --json
result_file: unit.json
timeout: 120000
workers: 4
environments:
  staging:
    base_url: https://staging.example.com
"#;
        let suite: Suite = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(suite.kind, SuiteKind::Jest);
        assert_eq!(suite.timeout(), Some(Duration::from_secs(120)));
        assert_eq!(suite.workers, Some(4));
        assert_eq!(
            suite.environments["staging"].base_url.as_deref(),
            Some("https://staging.example.com")
        );
    }

    #[test]
    fn test_matches_name_case_insensitive() {
        let suite = Suite::new("Integration", SuiteKind::Jest, "true", "int.json");
        assert!(suite.matches_name("integration"));
        assert!(suite.matches_name("INTEGRATION"));
        assert!(!suite.matches_name("integ"));
    }

    #[test]
    fn test_url_key_extractor() {
        let env = SuiteEnvironment::new().with_url_key("APP_URL");
        let extractor = env.extractor().unwrap();
        assert_eq!(
            extractor("# comment\nAPP_URL=\"http://localhost:3000\"\n"),
            Some("http://localhost:3000".to_string())
        );
        assert_eq!(extractor("OTHER=1"), None);
    }

    #[test]
    fn test_explicit_extractor_wins() {
        let env = SuiteEnvironment::new()
            .with_url_key("APP_URL")
            .with_url_extractor(|_| Some("http://fixed".to_string()));
        let extractor = env.extractor().unwrap();
        assert_eq!(extractor("APP_URL=http://other"), Some("http://fixed".to_string()));
    }
}
