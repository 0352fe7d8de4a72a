//! Configuration file management
//!
//! Handles finding and loading configuration files.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::{Config, ConfigError};

/// Configuration file locations (in order of precedence)
pub const CONFIG_LOCATIONS: &[&str] = &[
    "./testfold.yaml",
    "./testfold.yml",
    "./testfold.json",
    "./.testfold.yaml",
    "~/.config/testfold/config.yaml",
];

/// Find a configuration file in the standard locations
pub fn find_config(cwd: &Path) -> Option<PathBuf> {
    CONFIG_LOCATIONS
        .iter()
        .map(|location| expand_path(location, cwd))
        .find(|path| path.is_file())
}

/// Load and validate configuration, searching standard locations when no path is given
pub fn load_config(path: Option<&Path>, cwd: &Path) -> Result<Config, ConfigError> {
    let path = match path {
        Some(path) => {
            let full = cwd.join(path);
            if !full.is_file() {
                return Err(ConfigError::NotFound(full));
            }
            full
        }
        None => find_config(cwd).ok_or(ConfigError::NoConfigFile)?,
    };

    debug!("Loading config from {}", path.display());
    let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::Parse {
        path: path.clone(),
        message: e.to_string(),
    })?;

    let config: Config = if is_json_file(&path) {
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?
    } else {
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?
    };

    config.validate()?;
    Ok(config)
}

/// Expand ~ to home directory; relative paths resolve against `cwd`
fn expand_path(path: &str, cwd: &Path) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    cwd.join(path)
}

/// Check if file is JSON based on extension
fn is_json_file(path: &Path) -> bool {
    path.extension().map(|e| e == "json").unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const YAML: &str = r#"
artifacts_dir: ./test-results
parallel: false
suites:
  - name: Unit
    type: jest
    command: npx jest --json --outputFile test-results/unit.json
    result_file: unit.json
    timeout: 120000
"#;

    #[test]
    fn test_find_and_load_yaml() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("testfold.yaml"), YAML).unwrap();

        assert_eq!(find_config(dir.path()), Some(dir.path().join("./testfold.yaml")));
        let config = load_config(None, dir.path()).unwrap();
        assert!(!config.parallel);
        assert_eq!(config.suites[0].name, "Unit");
    }

    #[test]
    fn test_load_json() {
        let dir = tempdir().unwrap();
        let json = r#"{"artifacts_dir":"out","suites":[{"name":"E2E","type":"playwright","command":"npx playwright test","result_file":"e2e.json","workers":2}]}"#;
        std::fs::write(dir.path().join("custom.json"), json).unwrap();

        let config = load_config(Some(Path::new("custom.json")), dir.path()).unwrap();
        assert_eq!(config.suites[0].workers, Some(2));
    }

    #[test]
    fn test_explicit_path_missing() {
        let dir = tempdir().unwrap();
        let err = load_config(Some(Path::new("nope.yaml")), dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("bad.yaml"), "artifacts_dir: out\nsuites: []\n").unwrap();
        let err = load_config(Some(Path::new("bad.yaml")), dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_parse_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("broken.yaml"), "suites: [").unwrap();
        let err = load_config(Some(Path::new("broken.yaml")), dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
