//! Timeout-enforced external process execution.
//!
//! Thin wrapper around `tokio::process` used for both the package fetch and
//! the installer invocation. The runner resolves when the child closes,
//! regardless of exit code: callers infer failure from side effects (the
//! post-fetch artifact check), which is how npm-driven flows behave in
//! practice.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Errors from a single external command execution.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} did not close within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },

    #[error("Failed waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Spawn options for [`run`].
#[derive(Debug, Default)]
pub struct RunOptions {
    /// Hard wall-clock bound on the child. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Working directory for the child.
    pub cwd: Option<PathBuf>,
    /// Route the child's stdio to the null device instead of inheriting it.
    pub quiet: bool,
}

/// Run `program` with `args`, resolving when the child closes.
///
/// Exit codes are intentionally not inspected. When the timeout elapses the
/// child is sent a kill and the call fails with [`ProcessError::TimedOut`],
/// even if the process exits cleanly afterwards. The kill is best-effort:
/// the caller stops waiting, but the process tree is not guaranteed dead.
pub async fn run(program: &str, args: &[String], opts: &RunOptions) -> Result<(), ProcessError> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(cwd) = &opts.cwd {
        cmd.current_dir(cwd);
    }
    if opts.quiet {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
    }

    debug!(program, ?args, "spawning external command");
    let mut child = cmd.spawn().map_err(|source| ProcessError::SpawnFailed {
        program: program.to_string(),
        source,
    })?;

    match opts.timeout {
        Some(timeout) => match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(program, code = ?status.code(), "external command closed");
                Ok(())
            }
            Ok(Err(source)) => Err(ProcessError::Wait {
                program: program.to_string(),
                source,
            }),
            Err(_) => {
                warn!(program, ?timeout, "external command timed out, killing");
                let _ = child.start_kill();
                Err(ProcessError::TimedOut {
                    program: program.to_string(),
                    timeout,
                })
            }
        },
        None => match child.wait().await {
            Ok(status) => {
                debug!(program, code = ?status.code(), "external command closed");
                Ok(())
            }
            Err(source) => Err(ProcessError::Wait {
                program: program.to_string(),
                source,
            }),
        },
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_on_clean_close() {
        tokio_test::assert_ok!(run("true", &[], &RunOptions::default()).await);
    }

    #[tokio::test]
    async fn resolves_regardless_of_exit_code() {
        tokio_test::assert_ok!(run("false", &[], &RunOptions::default()).await);
    }

    #[tokio::test]
    async fn spawn_failure_is_immediate() {
        let err = run(
            "/nonexistent/definitely-not-a-binary",
            &[],
            &RunOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProcessError::SpawnFailed { .. }));
    }

    #[tokio::test]
    async fn timeout_produces_timed_out_not_a_hang() {
        let args = vec!["-c".to_string(), "sleep 5".to_string()];
        let opts = RunOptions {
            timeout: Some(Duration::from_millis(50)),
            cwd: None,
            quiet: true,
        };
        let started = std::time::Instant::now();
        let err = run("sh", &args, &opts).await.unwrap_err();
        assert!(matches!(err, ProcessError::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn honors_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let args = vec!["-c".to_string(), "test -d .".to_string()];
        let opts = RunOptions {
            timeout: Some(Duration::from_secs(5)),
            cwd: Some(dir.path().to_path_buf()),
            quiet: true,
        };
        tokio_test::assert_ok!(run("sh", &args, &opts).await);
    }
}
