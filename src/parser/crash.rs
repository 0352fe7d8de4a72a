//! Framework crash detection from suite logs

use std::path::Path;

use tracing::debug;

use crate::models::FailureDetail;

/// Name of the synthetic failure for a detected crash
pub const FRAMEWORK_CRASH_NAME: &str = "Framework Crash";

/// Log substrings that indicate the framework died before reporting
pub const CRASH_SIGNATURES: &[&str] = &[
    "Error:",
    "ReferenceError",
    "SyntaxError",
    "TypeError",
    "failed to run",
    "Timed out",
    "ECONNREFUSED",
    "Cannot find module",
    "globalSetup",
];

const LEAD_IN_LINES: usize = 2;
const SNIPPET_LINES: usize = 10;

pub fn detect_crash(log: &str) -> bool {
    CRASH_SIGNATURES.iter().any(|sig| log.contains(sig))
}

/// A few lines around the first signature match, or the head of the log
pub fn extract_snippet(log: &str) -> String {
    let lines: Vec<&str> = log.lines().collect();
    let first = lines
        .iter()
        .position(|line| CRASH_SIGNATURES.iter().any(|sig| line.contains(sig)));

    match first {
        Some(idx) => {
            let start = idx.saturating_sub(LEAD_IN_LINES);
            let end = (idx + SNIPPET_LINES).min(lines.len());
            lines[start..end].join("\n")
        }
        None => lines.iter().take(SNIPPET_LINES).copied().collect::<Vec<_>>().join("\n"),
    }
}

/// Crash failure if `log_file` exists and carries a signature
pub async fn crash_from_log(log_file: Option<&Path>) -> Option<FailureDetail> {
    let log_file = log_file?;
    let log = tokio::fs::read_to_string(log_file).await.ok()?;
    if !detect_crash(&log) {
        return None;
    }
    debug!("Crash signature found in {}", log_file.display());
    Some(FailureDetail::new(FRAMEWORK_CRASH_NAME, "", extract_snippet(&log)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_detect_crash() {
        assert!(detect_crash("Error: Cannot connect"));
        assert!(detect_crash("connect ECONNREFUSED 127.0.0.1:5432"));
        assert!(detect_crash("Error in globalSetup"));
        assert!(!detect_crash("Tests: 5 passed, 5 total"));
    }

    #[test]
    fn test_snippet_context() {
        let log = (0..30)
            .map(|i| if i == 12 { "TypeError: x is undefined".to_string() } else { format!("line {i}") })
            .collect::<Vec<_>>()
            .join("\n");
        let snippet = extract_snippet(&log);
        let lines: Vec<&str> = snippet.lines().collect();
        assert_eq!(lines.first(), Some(&"line 10"));
        assert_eq!(lines[2], "TypeError: x is undefined");
        assert_eq!(lines.len(), 12);
    }

    #[test]
    fn test_snippet_near_edges() {
        assert_eq!(extract_snippet("Error: boom\nat foo"), "Error: boom\nat foo");
        let head = (0..20).map(|i| format!("l{i}")).collect::<Vec<_>>().join("\n");
        assert_eq!(extract_snippet(&head).lines().count(), 10);
    }

    #[tokio::test]
    async fn test_crash_from_log() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("suite.log");
        assert!(crash_from_log(Some(&log)).await.is_none());
        assert!(crash_from_log(None).await.is_none());

        std::fs::write(&log, "Command: jest\n\nCannot find module './setup'\n").unwrap();
        let crash = crash_from_log(Some(&log)).await.unwrap();
        assert_eq!(crash.test_name, FRAMEWORK_CRASH_NAME);
        assert!(crash.error.contains("Cannot find module"));
    }
}
