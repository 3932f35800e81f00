//! Process Runner
//!
//! Spawns the external binary with an explicit environment (working
//! directory, PATH prepends) rather than relying on ambient process
//! state, enforces the invocation's timeout, and returns both output
//! streams unconditionally. Stderr is never swallowed: non-zero exits
//! carry the complete captured output so the classification layer can
//! pattern-match chain-level errors.

use crate::command::CommandInvocation;
use crate::error::{CoreError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Captured result of a successful (zero-exit) process invocation
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Execution seam for the external binary.
///
/// Production uses [`PocketProcessRunner`]; tests substitute a scripted
/// double that records invocations and replays canned outputs.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Execute an invocation to completion.
    ///
    /// Returns `Ok` only for a zero exit code. Failure classes:
    /// - [`CoreError::SpawnFailed`]: binary missing or not executable
    /// - [`CoreError::Timeout`]: allotted duration exceeded
    /// - [`CoreError::NonZeroExit`]: carries full stdout and stderr
    async fn run(&self, invocation: &CommandInvocation) -> Result<ProcessOutput>;
}

/// Tokio-based runner for the real external binary
#[derive(Debug, Default, Clone)]
pub struct PocketProcessRunner;

impl PocketProcessRunner {
    pub fn new() -> Self {
        Self
    }

    fn build_path_env(invocation: &CommandInvocation) -> Option<String> {
        if invocation.extra_path_entries.is_empty() {
            return None;
        }
        let mut entries: Vec<String> = invocation
            .extra_path_entries
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        if let Ok(existing) = std::env::var("PATH") {
            entries.push(existing);
        }
        Some(entries.join(":"))
    }
}

#[async_trait]
impl ProcessRunner for PocketProcessRunner {
    async fn run(&self, invocation: &CommandInvocation) -> Result<ProcessOutput> {
        let operation = invocation.operation_label();
        let program = invocation.program.display().to_string();

        let mut cmd = tokio::process::Command::new(&invocation.program);
        for arg in &invocation.args {
            cmd.arg(arg);
        }
        if let Some(dir) = invocation.work_dir.as_ref() {
            cmd.current_dir(dir);
        }
        if let Some(path) = Self::build_path_env(invocation) {
            cmd.env("PATH", path);
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.kill_on_drop(true);

        debug!(
            operation = %operation,
            program = %program,
            timeout_seconds = invocation.timeout.as_secs(),
            "Spawning external binary"
        );

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|err| CoreError::SpawnFailed {
            program: program.clone(),
            message: err.to_string(),
        })?;

        if let Some(payload) = invocation.stdin.as_ref() {
            // Write the secret payload then close the pipe so the child
            // sees EOF instead of waiting for more input.
            let mut stdin = child.stdin.take().ok_or_else(|| CoreError::SpawnFailed {
                program: program.clone(),
                message: "child stdin pipe unavailable".to_string(),
            })?;
            stdin
                .write_all(payload.as_bytes())
                .await
                .map_err(|err| CoreError::SpawnFailed {
                    program: program.clone(),
                    message: format!("writing stdin payload: {err}"),
                })?;
            drop(stdin);
        }

        let output = match tokio::time::timeout(invocation.timeout, child.wait_with_output()).await
        {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                return Err(CoreError::SpawnFailed {
                    program,
                    message: err.to_string(),
                })
            }
            Err(_) => {
                warn!(
                    operation = %operation,
                    timeout_seconds = invocation.timeout.as_secs(),
                    "⏱️ External binary timed out"
                );
                return Err(CoreError::timeout(operation, invocation.timeout.as_secs()));
            }
        };

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        crate::logging::log_process_invocation(
            &operation,
            &program,
            Some(exit_code),
            Some(started.elapsed().as_millis() as u64),
            if exit_code == 0 { "succeeded" } else { "failed" },
        );

        if exit_code != 0 {
            return Err(CoreError::NonZeroExit {
                exit_code,
                stdout,
                stderr,
            });
        }

        Ok(ProcessOutput {
            exit_code,
            stdout,
            stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn invocation(program: &str, args: &[&str]) -> CommandInvocation {
        CommandInvocation {
            program: PathBuf::from(program),
            args: args.iter().map(|a| a.to_string()).collect(),
            work_dir: None,
            extra_path_entries: Vec::new(),
            timeout: Duration::from_secs(5),
            stdin: None,
        }
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_failed() {
        let runner = PocketProcessRunner::new();
        let err = runner
            .run(&invocation("/nonexistent/definitely-not-a-binary", &[]))
            .await
            .expect_err("must fail");
        assert!(matches!(err, CoreError::SpawnFailed { .. }));
    }

    #[tokio::test]
    async fn test_captures_stdout_on_success() {
        let runner = PocketProcessRunner::new();
        let output = runner
            .run(&invocation("echo", &["hello"]))
            .await
            .expect("echo succeeds");
        assert_eq!(output.exit_code, 0);
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_nonzero_exit_carries_stderr() {
        let runner = PocketProcessRunner::new();
        let err = runner
            .run(&invocation("sh", &["-c", "echo oops >&2; exit 3"]))
            .await
            .expect_err("must fail");
        match err {
            CoreError::NonZeroExit {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, 3);
                assert!(stderr.contains("oops"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let runner = PocketProcessRunner::new();
        let mut slow = invocation("sleep", &["30"]);
        slow.timeout = Duration::from_millis(100);
        let err = runner.run(&slow).await.expect_err("must time out");
        assert!(matches!(err, CoreError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_stdin_payload_reaches_child() {
        let runner = PocketProcessRunner::new();
        let mut cat = invocation("cat", &[]);
        cat.stdin = Some("from stdin\n".to_string());
        let output = runner.run(&cat).await.expect("cat succeeds");
        assert_eq!(output.stdout, "from stdin\n");
    }
}
