//! Child-process execution with timeout and captured output.
//!
//! The runner is a total function: every failure mode (spawn error,
//! timeout, missing executable) is folded into an [`ExecutionResult`]
//! with a conventional exit code, so callers never have to branch on an
//! error type. Exactly one child process per call; retries, if any,
//! belong to the caller.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Default wall-clock limit for a package-manager child process.
pub const DEFAULT_CHILD_TIMEOUT: Duration = Duration::from_secs(600);

/// Exit code reported when the executable does not exist.
pub const EXIT_NOT_FOUND: i32 = 127;

/// Exit code reported when the executable is not permitted to run.
pub const EXIT_PERMISSION_DENIED: i32 = 126;

/// The captured outcome of one child-process run. Never mutated after
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionResult {
    /// Exit code (0 = success, -1 = terminated without a code).
    pub exit_code: i32,

    /// Captured stdout, lossily decoded as UTF-8.
    pub stdout: String,

    /// Captured stderr, lossily decoded as UTF-8.
    pub stderr: String,

    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// Whether the command exited 0.
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    fn failure(exit_code: i32, stderr: impl Into<String>, start: Instant) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// Trait seam over process execution so the confirmation gate can be
/// tested against a scripted runner.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `argv` with the given timeout and capture its output.
    async fn run(&self, argv: &[String], timeout: Duration) -> ExecutionResult;
}

/// Production runner backed by `tokio::process`.
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, argv: &[String], timeout: Duration) -> ExecutionResult {
        let start = Instant::now();

        let Some((exe, args)) = argv.split_first() else {
            return ExecutionResult::failure(1, "empty command", start);
        };

        tracing::debug!(command = %argv.join(" "), "executing command");

        let mut child = match Command::new(exe)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(err) => {
                let (code, detail) = match err.kind() {
                    std::io::ErrorKind::NotFound => {
                        (EXIT_NOT_FOUND, format!("command not found: {exe}"))
                    }
                    std::io::ErrorKind::PermissionDenied => (
                        EXIT_PERMISSION_DENIED,
                        format!("permission denied: {}", argv.join(" ")),
                    ),
                    _ => (1, err.to_string()),
                };
                tracing::error!(command = %exe, error = %detail, "failed to spawn command");
                return ExecutionResult::failure(code, detail, start);
            }
        };

        // Drain both pipes off-task so a full pipe buffer cannot deadlock
        // the child while we wait on it.
        let stdout_task = tokio::spawn(read_stream(child.stdout.take()));
        let stderr_task = tokio::spawn(read_stream(child.stderr.take()));

        let (exit_code, timeout_note) = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => (status.code().unwrap_or(-1), None),
            Ok(Err(err)) => (1, Some(format!("failed to wait for child: {err}"))),
            Err(_) => {
                tracing::error!(
                    command = %argv.join(" "),
                    timeout_secs = timeout.as_secs(),
                    "command timed out, killing child"
                );
                // Killing closes the pipes, which lets the drain tasks
                // finish with whatever output was produced so far.
                let _ = child.kill().await;
                (-1, Some(format!("timed out after {} seconds", timeout.as_secs())))
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let mut stderr = stderr_task.await.unwrap_or_default();
        if let Some(note) = timeout_note {
            if !stderr.is_empty() && !stderr.ends_with('\n') {
                stderr.push('\n');
            }
            stderr.push_str(&note);
        }

        tracing::debug!(exit_code, "command finished");

        ExecutionResult {
            exit_code,
            stdout,
            stderr,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

async fn read_stream<R>(pipe: Option<R>) -> String
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let result = ProcessRunner
            .run(&argv(&["echo", "hello"]), DEFAULT_CHILD_TIMEOUT)
            .await;
        assert_eq!(result.exit_code, 0);
        assert!(result.succeeded());
        assert!(result.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_run_failing_command() {
        let result = ProcessRunner
            .run(&argv(&["false"]), DEFAULT_CHILD_TIMEOUT)
            .await;
        assert!(!result.succeeded());
        assert_ne!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn test_run_missing_executable_reports_127() {
        let result = ProcessRunner
            .run(
                &argv(&["pipfix-no-such-binary-zz"]),
                DEFAULT_CHILD_TIMEOUT,
            )
            .await;
        assert_eq!(result.exit_code, EXIT_NOT_FOUND);
        assert!(result.stderr.contains("not found"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_permission_denied_reports_126() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-executable.sh");
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let result = ProcessRunner
            .run(
                &argv(&[path.to_str().unwrap()]),
                DEFAULT_CHILD_TIMEOUT,
            )
            .await;
        assert_eq!(result.exit_code, EXIT_PERMISSION_DENIED);
        assert!(result.stderr.contains("permission denied"));
    }

    #[tokio::test]
    async fn test_run_empty_argv() {
        let result = ProcessRunner.run(&[], DEFAULT_CHILD_TIMEOUT).await;
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("empty command"));
    }

    #[tokio::test]
    async fn test_run_timeout_kills_child() {
        let result = ProcessRunner
            .run(&argv(&["sleep", "30"]), Duration::from_millis(100))
            .await;
        assert_ne!(result.exit_code, 0);
        assert!(result.stderr.contains("timed out"));
    }
}
