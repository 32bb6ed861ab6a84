use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, trace};

use crate::ServiceError;

/// Captured result of a finished process
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Utility for spawning CLI-backed reasoning processes
pub struct ProcessSpawner;

impl ProcessSpawner {
    /// Spawn a process, capture its output, and enforce an optional timeout
    pub async fn spawn(
        binary: &Path,
        args: &[&str],
        timeout: Option<Duration>,
    ) -> Result<ProcessOutput, ServiceError> {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, Self::run(binary, args))
                .await
                .map_err(|_| ServiceError::Timeout(limit))?,
            None => Self::run(binary, args).await,
        }
    }

    async fn run(binary: &Path, args: &[&str]) -> Result<ProcessOutput, ServiceError> {
        let start = Instant::now();

        debug!(
            binary = %binary.display(),
            arg_count = args.len(),
            "Spawning reasoning process"
        );

        let mut child = Command::new(binary)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null()) // Non-interactive
            .kill_on_drop(true)
            .spawn()?;

        let stdout_handle = child
            .stdout
            .take()
            .ok_or_else(|| ServiceError::ExecutionFailed("stdout not captured".into()))?;
        let stderr_handle = child
            .stderr
            .take()
            .ok_or_else(|| ServiceError::ExecutionFailed("stderr not captured".into()))?;

        let mut stdout_reader = BufReader::new(stdout_handle).lines();
        let mut stderr_reader = BufReader::new(stderr_handle).lines();

        let mut stdout = String::new();
        let mut stderr = String::new();

        // Read both streams concurrently
        loop {
            tokio::select! {
                biased;

                result = stdout_reader.next_line() => {
                    match result {
                        Ok(Some(line)) => {
                            trace!(line = %line, "stdout");
                            push_line(&mut stdout, &line);
                        }
                        Ok(None) => {
                            // stdout closed, drain stderr
                            while let Ok(Some(line)) = stderr_reader.next_line().await {
                                trace!(line = %line, "stderr");
                                push_line(&mut stderr, &line);
                            }
                            break;
                        }
                        Err(e) => {
                            return Err(ServiceError::ExecutionFailed(format!(
                                "Failed to read stdout: {}",
                                e
                            )));
                        }
                    }
                }
                result = stderr_reader.next_line() => {
                    match result {
                        Ok(Some(line)) => {
                            trace!(line = %line, "stderr");
                            push_line(&mut stderr, &line);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            return Err(ServiceError::ExecutionFailed(format!(
                                "Failed to read stderr: {}",
                                e
                            )));
                        }
                    }
                }
            }
        }

        let status = child.wait().await?;
        let duration = start.elapsed();

        debug!(
            exit_code = status.code().unwrap_or(-1),
            duration_ms = duration.as_millis(),
            "Reasoning process completed"
        );

        Ok(ProcessOutput {
            stdout,
            stderr,
            exit_code: status.code().unwrap_or(-1),
            duration,
        })
    }
}

fn push_line(buffer: &mut String, line: &str) {
    if !buffer.is_empty() {
        buffer.push('\n');
    }
    buffer.push_str(line);
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_spawn_captures_stdout() {
        let output = ProcessSpawner::spawn(&PathBuf::from("echo"), &["hello"], None)
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "hello");
    }

    #[tokio::test]
    async fn test_spawn_times_out() {
        let result = ProcessSpawner::spawn(
            &PathBuf::from("sleep"),
            &["5"],
            Some(Duration::from_millis(50)),
        )
        .await;
        assert!(matches!(result, Err(ServiceError::Timeout(_))));
    }
}
