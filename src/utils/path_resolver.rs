//! Path prefix resolution
//!
//! Turns a short fragment such as `auth` into the test file it names
//! (`tests/e2e/auth.spec.ts`).

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

/// Extensions recognised as test files when none are configured
pub const DEFAULT_TEST_EXTENSIONS: &[&str] = &[".test.ts", ".test.js", ".spec.ts", ".spec.js"];

/// Where and what to search
#[derive(Clone, Debug)]
pub struct ResolveOptions {
    pub base_dir: PathBuf,
    pub extensions: Vec<String>,
}

impl ResolveOptions {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            extensions: DEFAULT_TEST_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }
}

/// Test files under `base_dir` whose stem starts with `prefix` (case-insensitive)
pub fn resolve_path_prefix(prefix: &str, options: &ResolveOptions) -> Vec<PathBuf> {
    if !options.base_dir.is_dir() {
        return Vec::new();
    }
    let prefix = prefix.to_lowercase();

    WalkDir::new(&options.base_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry))
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            test_stem(entry.path(), &options.extensions)
                .map(|stem| stem.to_lowercase().starts_with(&prefix))
                .unwrap_or(false)
        })
        .map(DirEntry::into_path)
        .collect()
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || name == "node_modules"
}

/// File name with its test extension removed; `None` for non-test files
fn test_stem<'a>(path: &'a Path, extensions: &[String]) -> Option<&'a str> {
    let name = path.file_name()?.to_str()?;
    extensions.iter().find_map(|ext| name.strip_suffix(ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "").unwrap();
    }

    #[test]
    fn test_resolves_unique_prefix() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "e2e/Auth.spec.ts");
        touch(dir.path(), "e2e/billing.spec.ts");
        touch(dir.path(), "e2e/auth-helpers.ts");

        let options = ResolveOptions::new(dir.path());
        let matches = resolve_path_prefix("auth", &options);
        assert_eq!(matches, vec![dir.path().join("e2e/Auth.spec.ts")]);
    }

    #[test]
    fn test_skips_hidden_and_node_modules() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "node_modules/pkg/login.test.js");
        touch(dir.path(), ".cache/login.test.js");
        touch(dir.path(), "unit/login.test.js");

        let matches = resolve_path_prefix("login", &ResolveOptions::new(dir.path()));
        assert_eq!(matches, vec![dir.path().join("unit/login.test.js")]);
    }

    #[test]
    fn test_ambiguous_and_missing() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "a/user-create.test.ts");
        touch(dir.path(), "b/user-delete.test.ts");
        let options = ResolveOptions::new(dir.path());

        assert_eq!(resolve_path_prefix("user", &options).len(), 2);
        assert!(resolve_path_prefix("order", &options).is_empty());
        assert!(resolve_path_prefix("x", &ResolveOptions::new(dir.path().join("nope"))).is_empty());
    }
}
