mod process;
mod stream;

use std::io;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::config::LimitsConfig;
use crate::error::SlurmError;

const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(2);

use self::process::{apply_process_group, kill_group, terminate_child};
use self::stream::{format_capture, read_stream_capture};

/// Captured output of one finished external process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs one argv to completion. The seam between the operation wrappers and the OS.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn execute(&self, argv: &[String]) -> Result<CommandResult, SlurmError>;
}

/// Spawns real child processes with a hard timeout.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    timeout: Duration,
    max_output_bytes: usize,
}

impl ProcessExecutor {
    pub fn new(limits: &LimitsConfig) -> Self {
        Self {
            timeout: limits.timeout(),
            max_output_bytes: usize::try_from(limits.max_output_bytes).unwrap_or(usize::MAX),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new(&LimitsConfig::default())
    }
}

#[async_trait]
impl CommandRunner for ProcessExecutor {
    async fn execute(&self, argv: &[String]) -> Result<CommandResult, SlurmError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| SlurmError::unexpected("empty command"))?;
        let command_line = argv.join(" ");
        let started_at = Instant::now();
        tracing::debug!(command = %command_line, "spawning external command");

        let cancel = CancellationToken::new();
        let mut run = Box::pin(run_child(
            program,
            args,
            self.max_output_bytes,
            cancel.clone(),
        ));
        let mut timed_out = false;
        let outcome = tokio::select! {
            result = &mut run => result,
            _ = tokio::time::sleep(self.timeout) => {
                timed_out = true;
                cancel.cancel();
                run.await
            }
        };

        if timed_out {
            tracing::warn!(
                command = %command_line,
                timeout_secs = self.timeout.as_secs(),
                "external command timed out"
            );
            return Err(SlurmError::Timeout {
                command: command_line,
                secs: self.timeout.as_secs(),
            });
        }

        match &outcome {
            Ok(result) => tracing::debug!(
                command = %command_line,
                exit_code = result.exit_code,
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "external command finished"
            ),
            Err(err) => tracing::debug!(command = %command_line, error = %err, "external command failed"),
        }
        outcome
    }
}

async fn run_child(
    program: &str,
    args: &[String],
    max_bytes: usize,
    cancel: CancellationToken,
) -> Result<CommandResult, SlurmError> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);
    apply_process_group(&mut cmd);
    let mut child = cmd.spawn().map_err(|err| spawn_error(program, err))?;
    let pgid = child.id();

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| SlurmError::unexpected("missing stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| SlurmError::unexpected("missing stderr"))?;
    let stdout_task = tokio::spawn(read_stream_capture(stdout, max_bytes));
    let stderr_task = tokio::spawn(read_stream_capture(stderr, max_bytes));
    let mut captures = tokio::spawn(async move { (stdout_task.await, stderr_task.await) });

    let status = tokio::select! {
        status = child.wait() => status,
        _ = cancel.cancelled() => {
            terminate_child(&mut child, pgid).await;
            captures.abort();
            return Err(SlurmError::unexpected(format!("{program} was terminated")));
        }
    };

    // A background descendant can keep the pipes open after the tool itself has exited.
    let (stdout, stderr) = match tokio::time::timeout(PIPE_DRAIN_GRACE, &mut captures).await {
        Ok(joined) => joined,
        Err(_) => {
            tracing::debug!(program, "output pipes still open after exit, killing process group");
            kill_group(pgid);
            tokio::select! {
                joined = &mut captures => joined,
                _ = cancel.cancelled() => {
                    captures.abort();
                    return Err(SlurmError::unexpected(format!("{program} left its output open")));
                }
            }
        }
    }
    .map_err(|err| SlurmError::unexpected(format!("capture task join: {err}")))?;

    let status = status.map_err(|err| SlurmError::unexpected(format!("wait on {program}: {err}")))?;
    let (stdout_bytes, stdout_truncated) = join_capture(stdout, "stdout")?;
    let (stderr_bytes, stderr_truncated) = join_capture(stderr, "stderr")?;
    let exit_code = status
        .code()
        .ok_or_else(|| SlurmError::unexpected(format!("{program} terminated by {status}")))?;

    Ok(CommandResult {
        stdout: format_capture(&stdout_bytes, stdout_truncated),
        stderr: format_capture(&stderr_bytes, stderr_truncated),
        exit_code,
    })
}

fn join_capture(
    joined: Result<io::Result<(Vec<u8>, bool)>, tokio::task::JoinError>,
    label: &str,
) -> Result<(Vec<u8>, bool), SlurmError> {
    joined
        .map_err(|err| SlurmError::unexpected(format!("{label} task join: {err}")))?
        .map_err(|err| SlurmError::unexpected(format!("{label} read: {err}")))
}

fn spawn_error(program: &str, err: io::Error) -> SlurmError {
    match err.kind() {
        io::ErrorKind::NotFound => SlurmError::NotFound {
            program: program.to_string(),
        },
        _ => SlurmError::unexpected(format!("spawn {program}: {err}")),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_utils::temp_dir;

    fn sh(script: &str) -> Vec<String> {
        vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
    }

    fn executor(timeout_ms: u64) -> ProcessExecutor {
        ProcessExecutor {
            timeout: Duration::from_millis(timeout_ms),
            max_output_bytes: 1024 * 1024,
        }
    }

    #[tokio::test]
    async fn captures_stdout_stderr_and_exit_code() {
        let result = executor(5_000)
            .execute(&sh("echo out; echo err >&2; exit 3"))
            .await
            .expect("execute");
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
        assert_eq!(result.exit_code, 3);
        assert!(!result.success());
    }

    #[tokio::test]
    async fn missing_program_is_not_found() {
        let argv = vec!["vibeslurm-definitely-missing-tool".to_string()];
        let err = executor(5_000).execute(&argv).await.unwrap_err();
        assert_eq!(
            err,
            SlurmError::NotFound {
                program: "vibeslurm-definitely-missing-tool".to_string()
            }
        );
    }

    #[tokio::test]
    async fn empty_argv_is_unexpected() {
        let err = executor(5_000).execute(&[]).await.unwrap_err();
        assert!(matches!(err, SlurmError::Unexpected { .. }));
    }

    #[tokio::test]
    async fn background_descendant_does_not_hold_the_result() {
        let started = Instant::now();
        let result = executor(20_000)
            .execute(&sh("echo submitted; sleep 30 &"))
            .await
            .expect("execute");
        assert_eq!(result.stdout, "submitted\n");
        assert_eq!(result.exit_code, 0);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn timeout_terminates_the_process() {
        let dir = temp_dir("vibeslurm-exec");
        let pid_file = dir.join("pid");
        let script = format!("echo $$ > {}; exec sleep 30", pid_file.display());

        let started = Instant::now();
        let err = executor(500).execute(&sh(&script)).await.unwrap_err();
        assert!(matches!(err, SlurmError::Timeout { secs: 0, .. }));
        assert!(started.elapsed() < Duration::from_secs(10));

        let pid: i32 = std::fs::read_to_string(&pid_file)
            .expect("pid file")
            .trim()
            .parse()
            .expect("pid");
        let alive = unsafe { libc::kill(pid, 0) } == 0;
        assert!(!alive, "timed out process {pid} is still running");
        let _ = std::fs::remove_dir_all(dir);
    }
}
