//! Environment composition for a suite process

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::config::env::extract_url;
use crate::models::Suite;

/// Variable carrying the base URL of the system under test
pub const BASE_URL_VAR: &str = "TEST_BASE_URL";

/// Merge, lowest precedence first: suite `env`, env-file variables, then the
/// named environment's own `env`. The named environment also supplies
/// `TEST_BASE_URL`, extracted from its env file when it has an extractor,
/// otherwise taken from its static `base_url`.
pub fn compose_env(
    suite: &Suite,
    env_file_vars: &BTreeMap<String, String>,
    environment: Option<&str>,
    cwd: &Path,
) -> BTreeMap<String, String> {
    let mut env = suite.env.clone();
    env.extend(env_file_vars.iter().map(|(k, v)| (k.clone(), v.clone())));

    let Some(named) = environment.and_then(|name| suite.environments.get(name)) else {
        return env;
    };
    env.extend(named.env.iter().map(|(k, v)| (k.clone(), v.clone())));

    match (named.extractor(), named.env_file.as_deref()) {
        (Some(extractor), Some(env_file)) => {
            if let Some(url) = extract_url(env_file, &extractor, cwd) {
                debug!("{}: {} extracted from {}", suite.name, BASE_URL_VAR, env_file);
                env.insert(BASE_URL_VAR.to_string(), url);
            }
        }
        _ => {
            if let Some(url) = &named.base_url {
                env.insert(BASE_URL_VAR.to_string(), url.clone());
            }
        }
    }
    env
}
