use std::path::Path;
use std::sync::Arc;

use crate::config::{Config, ToolsConfig};
use crate::detail::{extract_output_paths, OutputPaths};
use crate::error::SlurmError;
use crate::executor::{CommandRunner, ProcessExecutor};
use crate::queue::{parse_queue, JobRow};
use crate::request::{CommandRequest, OutputStream};

/// Per-operation wrappers over a [`CommandRunner`]. Every wrapper reports a non-zero exit as
/// [`SlurmError::CommandFailed`] carrying the tool's stderr.
#[derive(Clone)]
pub struct SlurmCommands {
    runner: Arc<dyn CommandRunner>,
    tools: ToolsConfig,
}

impl SlurmCommands {
    pub fn new(runner: Arc<dyn CommandRunner>, tools: ToolsConfig) -> Self {
        Self { runner, tools }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(ProcessExecutor::new(&config.limits)),
            config.tools.clone(),
        )
    }

    /// Runs any request and returns the text to show for it.
    pub async fn run(&self, request: &CommandRequest) -> Result<String, SlurmError> {
        match request {
            CommandRequest::CancelJob { job_id } => self.scancel(job_id).await,
            CommandRequest::CancelAllForUser { user } => self.scancel_user(user).await,
            CommandRequest::ReadJobOutputFile { job_id, stream } => {
                self.read_output_file(job_id, *stream).await
            }
            CommandRequest::ListQueue { .. }
            | CommandRequest::SubmitScript { .. }
            | CommandRequest::ShowJobDetail { .. }
            | CommandRequest::ShowClusterInfo { .. } => self.run_checked(request).await,
        }
    }

    pub async fn squeue(&self, user: Option<&str>) -> Result<String, SlurmError> {
        self.run_checked(&CommandRequest::list_queue(user)).await
    }

    pub async fn list_jobs(&self, user: Option<&str>) -> Result<Vec<JobRow>, SlurmError> {
        let output = self.squeue(user).await?;
        Ok(parse_queue(&output))
    }

    pub async fn scancel(&self, job_id: &str) -> Result<String, SlurmError> {
        let request = CommandRequest::CancelJob {
            job_id: job_id.to_string(),
        };
        let output = self.run_checked(&request).await?;
        Ok(or_confirmation(output, || {
            format!("Job {job_id} cancelled successfully")
        }))
    }

    pub async fn scancel_user(&self, user: &str) -> Result<String, SlurmError> {
        let request = CommandRequest::CancelAllForUser {
            user: user.to_string(),
        };
        let output = self.run_checked(&request).await?;
        Ok(or_confirmation(output, || {
            format!("All jobs for user {user} cancelled successfully")
        }))
    }

    pub async fn sbatch(&self, script_path: &str) -> Result<String, SlurmError> {
        self.run_checked(&CommandRequest::SubmitScript {
            path: script_path.to_string(),
        })
        .await
    }

    pub async fn scontrol_show_job(&self, job_id: &str) -> Result<String, SlurmError> {
        self.run_checked(&CommandRequest::ShowJobDetail {
            job_id: job_id.to_string(),
        })
        .await
    }

    pub async fn sinfo(&self, partition: Option<&str>) -> Result<String, SlurmError> {
        self.run_checked(&CommandRequest::cluster_info(partition))
            .await
    }

    /// Looks up the job's output paths. The detail report is fetched fresh on every call.
    pub async fn output_paths(&self, job_id: &str) -> Result<OutputPaths, SlurmError> {
        let report = self.scontrol_show_job(job_id).await?;
        Ok(extract_output_paths(&report))
    }

    pub async fn read_output_file(
        &self,
        job_id: &str,
        stream: OutputStream,
    ) -> Result<String, SlurmError> {
        let paths = self.output_paths(job_id).await?;
        let path = paths
            .get(stream)
            .ok_or_else(|| SlurmError::NoOutputFileConfigured {
                job_id: job_id.to_string(),
                stream,
            })?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| SlurmError::from_file_io(path, &err))?;
        tracing::debug!(job_id, path = %path.display(), bytes = bytes.len(), "read job output file");
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn run_checked(&self, request: &CommandRequest) -> Result<String, SlurmError> {
        let argv = request.argv(&self.tools);
        let result = self.runner.execute(&argv).await?;
        if !result.success() {
            return Err(SlurmError::CommandFailed {
                tool: tool_name(&argv),
                stderr: result.stderr,
            });
        }
        Ok(result.stdout)
    }
}

fn or_confirmation(output: String, message: impl FnOnce() -> String) -> String {
    if output.trim().is_empty() {
        message()
    } else {
        output
    }
}

fn tool_name(argv: &[String]) -> String {
    let program = argv.first().map(String::as_str).unwrap_or_default();
    Path::new(program)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(program)
        .to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::executor::CommandResult;
    use crate::test_utils::temp_dir;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted results and records every argv it was handed.
    #[derive(Default)]
    pub(crate) struct ScriptedRunner {
        replies: Mutex<VecDeque<Result<CommandResult, SlurmError>>>,
        pub(crate) calls: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedRunner {
        pub(crate) fn reply(self, reply: Result<CommandResult, SlurmError>) -> Self {
            self.replies.lock().unwrap().push_back(reply);
            self
        }

        pub(crate) fn ok(self, stdout: &str) -> Self {
            self.reply(Ok(CommandResult {
                stdout: stdout.to_string(),
                ..CommandResult::default()
            }))
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn execute(&self, argv: &[String]) -> Result<CommandResult, SlurmError> {
            self.calls.lock().unwrap().push(argv.to_vec());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(CommandResult::default()))
        }
    }

    fn commands(runner: ScriptedRunner) -> (SlurmCommands, Arc<ScriptedRunner>) {
        let runner = Arc::new(runner);
        let commands = SlurmCommands::new(runner.clone(), ToolsConfig::default());
        (commands, runner)
    }

    #[tokio::test]
    async fn cancel_with_empty_output_reports_confirmation() {
        let (commands, runner) = commands(ScriptedRunner::default().ok(""));
        let message = commands.scancel("4242").await.expect("cancel");
        assert_eq!(message, "Job 4242 cancelled successfully");
        assert_eq!(runner.calls.lock().unwrap()[0], ["scancel", "4242"]);
    }

    #[tokio::test]
    async fn cancel_all_with_empty_output_reports_confirmation() {
        let (commands, _) = commands(ScriptedRunner::default().ok("\n"));
        let message = commands.scancel_user("alice").await.expect("cancel");
        assert_eq!(message, "All jobs for user alice cancelled successfully");
    }

    #[tokio::test]
    async fn non_zero_exit_becomes_command_failed() {
        let (commands, _) = commands(ScriptedRunner::default().reply(Ok(CommandResult {
            stdout: String::new(),
            stderr: "sbatch: error: Unable to open file run.sh\n".to_string(),
            exit_code: 1,
        })));
        let err = commands.sbatch("run.sh").await.unwrap_err();
        assert_eq!(
            err,
            SlurmError::CommandFailed {
                tool: "sbatch".to_string(),
                stderr: "sbatch: error: Unable to open file run.sh\n".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn executor_errors_pass_through() {
        let (commands, _) = commands(ScriptedRunner::default().reply(Err(SlurmError::NotFound {
            program: "squeue".to_string(),
        })));
        let err = commands.list_jobs(None).await.unwrap_err();
        assert!(matches!(err, SlurmError::NotFound { .. }));
    }

    #[tokio::test]
    async fn list_jobs_parses_rows() {
        let (commands, runner) = commands(ScriptedRunner::default().ok(
            "JOBID PARTITION NAME USER ST TIME NODES NODELIST\n1 cpu a alice R 0:01 1 n1\n",
        ));
        let rows = commands.list_jobs(Some("alice")).await.expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(runner.calls.lock().unwrap()[0], ["squeue", "-u", "alice"]);
    }

    #[tokio::test]
    async fn read_output_file_follows_detail_report() {
        let dir = temp_dir("vibeslurm-read");
        let out = dir.join("job.out");
        std::fs::write(&out, "hello from job\n").expect("write");
        let report = format!("JobId=9\n   StdOut={}\n", out.display());
        let (commands, runner) = commands(ScriptedRunner::default().ok(&report));

        let text = commands
            .run(&CommandRequest::ReadJobOutputFile {
                job_id: "9".to_string(),
                stream: OutputStream::Stdout,
            })
            .await
            .expect("read");
        assert_eq!(text, "hello from job\n");
        assert_eq!(
            runner.calls.lock().unwrap()[0],
            ["scontrol", "show", "job", "9"]
        );
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn read_output_file_without_path_is_reported() {
        let (commands, _) = commands(ScriptedRunner::default().ok("JobId=9\n   StdOut=/x\n"));
        let err = commands
            .read_output_file("9", OutputStream::Stderr)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SlurmError::NoOutputFileConfigured {
                job_id: "9".to_string(),
                stream: OutputStream::Stderr,
            }
        );
    }

    #[tokio::test]
    async fn read_output_file_before_creation_is_unavailable() {
        let dir = temp_dir("vibeslurm-read-missing");
        let report = format!("StdOut={}\n", dir.join("later.out").display());
        let (commands, _) = commands(ScriptedRunner::default().ok(&report));
        let err = commands
            .read_output_file("9", OutputStream::Stdout)
            .await
            .unwrap_err();
        assert!(matches!(err, SlurmError::FileUnavailable { .. }));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn tool_name_strips_directories() {
        assert_eq!(tool_name(&["/opt/slurm/bin/squeue".to_string()]), "squeue");
        assert_eq!(tool_name(&["sinfo".to_string()]), "sinfo");
    }
}
