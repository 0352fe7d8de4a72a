//! Suite executor
//!
//! Runs one suite's command as a child process in its own process group,
//! streams and captures its output, enforces the timeout and writes the
//! suite log.

mod buffer;
pub mod command;
mod signal;

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::Suite;
use crate::utils::timer::Timer;

pub use buffer::{OutputBuffer, MAX_BUFFER_BYTES};
pub use command::{build_command_line, FilterOptions};
pub use signal::KillPhase;

/// Exit code reported for a suite killed by its timeout
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Default time between the graceful and the forceful signal
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// How long output readers may linger after the child exits (e.g. a
/// background grandchild still holding the pipe)
const PIPE_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Receives output chunks as they arrive
pub type OutputCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Options for a single execution
#[derive(Clone)]
pub struct ExecuteOptions {
    pub cwd: PathBuf,
    /// Composed environment, layered over the inherited one
    pub env: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
    pub kill_grace_period: Duration,
    pub log_file: PathBuf,
    pub pass_through: Vec<String>,
    /// Root for resolving pass-through file prefixes
    pub tests_dir: Option<PathBuf>,
    pub filters: FilterOptions,
    pub on_output: Option<OutputCallback>,
}

impl ExecuteOptions {
    pub fn new(cwd: impl Into<PathBuf>, log_file: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            env: BTreeMap::new(),
            timeout: None,
            kill_grace_period: DEFAULT_KILL_GRACE,
            log_file: log_file.into(),
            pass_through: Vec::new(),
            tests_dir: None,
            filters: FilterOptions::default(),
            on_output: None,
        }
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_kill_grace_period(mut self, grace: Duration) -> Self {
        self.kill_grace_period = grace;
        self
    }

    pub fn with_pass_through(mut self, args: Vec<String>) -> Self {
        self.pass_through = args;
        self
    }

    pub fn with_tests_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.tests_dir = dir;
        self
    }

    pub fn with_filters(mut self, filters: FilterOptions) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_output_callback(mut self, callback: Option<OutputCallback>) -> Self {
        self.on_output = callback;
        self
    }
}

impl std::fmt::Debug for ExecuteOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecuteOptions")
            .field("cwd", &self.cwd)
            .field("env", &self.env)
            .field("timeout", &self.timeout)
            .field("kill_grace_period", &self.kill_grace_period)
            .field("log_file", &self.log_file)
            .field("pass_through", &self.pass_through)
            .field("tests_dir", &self.tests_dir)
            .field("filters", &self.filters)
            .field("on_output", &self.on_output.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Outcome of one execution
#[derive(Clone, Debug)]
pub struct ExecuteResult {
    /// Process exit code; [`TIMEOUT_EXIT_CODE`] when killed by the timeout
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    /// Set when the timeout fired
    pub killed: Option<KillPhase>,
}

impl ExecuteResult {
    pub fn timed_out(&self) -> bool {
        self.killed.is_some()
    }
}

/// Run `suite` to completion. Never fails: spawn errors become exit code 1.
pub async fn execute(suite: &Suite, options: &ExecuteOptions) -> ExecuteResult {
    let command_line = build_command_line(
        suite,
        &options.filters,
        &options.pass_through,
        options.tests_dir.as_deref(),
    );
    let timer = Timer::start(format!("execute {}", suite.name));

    info!("Running {}: {}", suite.name, command_line);

    let mut cmd = shell_command(&command_line);
    cmd.current_dir(&options.cwd)
        .envs(&options.env)
        .env("FORCE_COLOR", "1")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    signal::set_process_group(&mut cmd);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!("Failed to spawn {}: {}", suite.name, e);
            let result = ExecuteResult {
                exit_code: 1,
                stdout: String::new(),
                stderr: e.to_string(),
                duration: timer.elapsed(),
                killed: None,
            };
            // The leading "Error:" line lets crash detection pick this up.
            let log = format!(
                "Error: {}\n\n{}",
                e,
                format_log(&command_line, result.exit_code, &result)
            );
            write_log(&options.log_file, log).await;
            return result;
        }
    };

    let stdout_buf = Arc::new(Mutex::new(OutputBuffer::new()));
    let stderr_buf = Arc::new(Mutex::new(OutputBuffer::new()));
    let mut pumps = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        pumps.push(spawn_pump(stdout, Arc::clone(&stdout_buf), options.on_output.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        pumps.push(spawn_pump(stderr, Arc::clone(&stderr_buf), options.on_output.clone()));
    }

    let (status, killed) = match options.timeout {
        Some(timeout) => match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => (status, None),
            Err(_) => {
                warn!("{} exceeded timeout of {}ms", suite.name, timeout.as_millis());
                let (status, phase) = signal::terminate(&mut child, options.kill_grace_period).await;
                (status, Some(phase))
            }
        },
        None => (child.wait().await, None),
    };

    for mut pump in pumps {
        if tokio::time::timeout(PIPE_DRAIN_TIMEOUT, &mut pump).await.is_err() {
            debug!("Output pipe for {} still open after exit, detaching", suite.name);
            pump.abort();
        }
    }

    let raw_code = match &status {
        Ok(status) => exit_code_of(status),
        Err(e) => {
            warn!("Failed to wait for {}: {}", suite.name, e);
            1
        }
    };

    let result = ExecuteResult {
        exit_code: if killed.is_some() { TIMEOUT_EXIT_CODE } else { raw_code },
        stdout: snapshot(&stdout_buf),
        stderr: snapshot(&stderr_buf),
        duration: timer.stop(),
        killed,
    };

    write_log(&options.log_file, format_log(&command_line, raw_code, &result)).await;
    result
}

/// `line` run through the platform shell
#[cfg(unix)]
pub(crate) fn shell_command(line: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(line);
    cmd
}

#[cfg(windows)]
pub(crate) fn shell_command(line: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(line);
    cmd
}

fn spawn_pump<R>(
    mut reader: R,
    buffer: Arc<Mutex<OutputBuffer>>,
    callback: Option<OutputCallback>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 8192];
        loop {
            let n = match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            buffer
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(&chunk[..n]);

            if let Some(callback) = &callback {
                let text = String::from_utf8_lossy(&chunk[..n]);
                // A panicking callback must not stop capture.
                let _ = catch_unwind(AssertUnwindSafe(|| callback(&text)));
            }
        }
    })
}

fn snapshot(buffer: &Mutex<OutputBuffer>) -> String {
    buffer
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .to_string_lossy()
}

#[cfg(unix)]
fn exit_code_of(status: &ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code_of(status: &ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

/// Log body: command, exit code, duration, kill marker, then both streams
pub fn format_log(command_line: &str, exit_code: i32, result: &ExecuteResult) -> String {
    let mut lines = vec![
        format!("Command: {command_line}"),
        format!("Exit Code: {exit_code}"),
        format!("Duration: {}ms", result.duration.as_millis()),
    ];
    if result.timed_out() {
        lines.push("Status: KILLED (timeout)".to_string());
    }
    lines.push(String::new());
    lines.push("=== STDOUT ===".to_string());
    lines.push(result.stdout.clone());
    lines.push(String::new());
    lines.push("=== STDERR ===".to_string());
    lines.push(result.stderr.clone());
    lines.join("\n")
}

async fn write_log(path: &Path, content: String) {
    if let Some(parent) = path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            warn!("Failed to create log directory {}: {}", parent.display(), e);
        }
    }
    if let Err(e) = tokio::fs::write(path, content).await {
        warn!("Failed to write log {}: {}", path.display(), e);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::models::SuiteKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn suite(command: &str) -> Suite {
        Suite::new("unit", SuiteKind::Custom, command, "unit.json")
    }

    #[tokio::test]
    async fn test_shell_command_runs_line_through_shell() {
        let output = shell_command("a=2; echo $((a + 1)) | tr 3 x")
            .output()
            .await
            .unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout), "x\n");
    }

    #[tokio::test]
    async fn test_captures_output_and_writes_log() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("logs/unit.log");
        let options = ExecuteOptions::new(dir.path(), &log);

        let result = execute(&suite("echo out; echo err >&2; exit 3"), &options).await;
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
        assert!(!result.timed_out());

        let content = std::fs::read_to_string(&log).unwrap();
        assert!(content.starts_with("Command: echo out; echo err >&2; exit 3\nExit Code: 3\n"));
        assert!(content.contains("=== STDOUT ===\nout\n"));
        assert!(content.contains("=== STDERR ===\nerr\n"));
        assert!(!content.contains("KILLED"));
    }

    #[tokio::test]
    async fn test_environment_and_force_color() {
        let dir = tempdir().unwrap();
        let mut env = BTreeMap::new();
        env.insert("TEST_BASE_URL".to_string(), "http://localhost:4000".to_string());
        let options = ExecuteOptions::new(dir.path(), dir.path().join("env.log")).with_env(env);

        let result = execute(&suite("echo \"$TEST_BASE_URL $FORCE_COLOR\""), &options).await;
        assert_eq!(result.stdout.trim(), "http://localhost:4000 1");
    }

    #[tokio::test]
    async fn test_timeout_reports_124() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("slow.log");
        let options = ExecuteOptions::new(dir.path(), &log)
            .with_timeout(Some(Duration::from_millis(200)))
            .with_kill_grace_period(Duration::from_millis(500));

        let result = execute(&suite("echo started; sleep 30"), &options).await;
        assert_eq!(result.exit_code, TIMEOUT_EXIT_CODE);
        assert!(result.timed_out());
        assert!(result.duration < Duration::from_secs(10));
        assert_eq!(result.stdout, "started\n");

        let content = std::fs::read_to_string(&log).unwrap();
        assert!(content.contains("Status: KILLED (timeout)"));
    }

    #[tokio::test]
    async fn test_timeout_escalates_past_ignored_term() {
        let dir = tempdir().unwrap();
        let options = ExecuteOptions::new(dir.path(), dir.path().join("stubborn.log"))
            .with_timeout(Some(Duration::from_millis(300)))
            .with_kill_grace_period(Duration::from_millis(300));

        let result = execute(&suite("trap '' TERM; sleep 30; sleep 30"), &options).await;
        assert_eq!(result.exit_code, TIMEOUT_EXIT_CODE);
        assert_eq!(result.killed, Some(KillPhase::Forceful));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_captured() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("missing.log");
        let options = ExecuteOptions::new(dir.path().join("does-not-exist"), &log);

        let result = execute(&suite("true"), &options).await;
        assert_eq!(result.exit_code, 1);
        assert!(!result.stderr.is_empty());
        let content = std::fs::read_to_string(&log).unwrap();
        assert!(content.starts_with("Error: "));
        assert!(content.contains("Exit Code: 1"));
    }

    #[tokio::test]
    async fn test_streaming_callback_survives_panic() {
        let dir = tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let callback: OutputCallback = Arc::new(move |_chunk: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
            panic!("reporter bug");
        });
        let options = ExecuteOptions::new(dir.path(), dir.path().join("cb.log"))
            .with_output_callback(Some(callback));

        let result = execute(&suite("echo one; sleep 0.1; echo two"), &options).await;
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "one\ntwo\n");
        assert!(calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_filters_and_pass_through_reach_command() {
        let dir = tempdir().unwrap();
        let options = ExecuteOptions::new(dir.path(), dir.path().join("args.log"))
            .with_filters(FilterOptions {
                grep: Some("login flow".to_string()),
                ..Default::default()
            })
            .with_pass_through(vec!["--headed".to_string()]);

        let result = execute(&suite("printf '%s|'"), &options).await;
        assert_eq!(result.stdout, "--grep=login flow|--headed|");
    }
}
