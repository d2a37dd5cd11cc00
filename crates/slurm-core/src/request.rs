use std::fmt;

use serde::Serialize;

use crate::config::ToolsConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

/// One user-level operation against the workload manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandRequest {
    ListQueue {
        user: Option<String>,
        job_id: Option<String>,
    },
    CancelJob {
        job_id: String,
    },
    CancelAllForUser {
        user: String,
    },
    SubmitScript {
        path: String,
    },
    ShowJobDetail {
        job_id: String,
    },
    ShowClusterInfo {
        partition: Option<String>,
    },
    ReadJobOutputFile {
        job_id: String,
        stream: OutputStream,
    },
}

impl CommandRequest {
    pub fn list_queue(user: Option<&str>) -> Self {
        Self::ListQueue {
            user: non_blank(user),
            job_id: None,
        }
    }

    pub fn cluster_info(partition: Option<&str>) -> Self {
        Self::ShowClusterInfo {
            partition: non_blank(partition),
        }
    }

    /// Builds the argv for this request. `ReadJobOutputFile` resolves its file through the job
    /// detail report, so it shares that invocation.
    pub fn argv(&self, tools: &ToolsConfig) -> Vec<String> {
        match self {
            Self::ListQueue { user, job_id } => {
                let mut argv = vec![tools.squeue.clone()];
                if let Some(user) = non_blank(user.as_deref()) {
                    argv.extend(["-u".to_string(), user]);
                }
                if let Some(job_id) = non_blank(job_id.as_deref()) {
                    argv.extend(["-j".to_string(), job_id]);
                }
                argv
            }
            Self::CancelJob { job_id } => vec![tools.scancel.clone(), job_id.clone()],
            Self::CancelAllForUser { user } => {
                vec![tools.scancel.clone(), "-u".to_string(), user.clone()]
            }
            Self::SubmitScript { path } => vec![tools.sbatch.clone(), path.clone()],
            Self::ShowJobDetail { job_id } | Self::ReadJobOutputFile { job_id, .. } => vec![
                tools.scontrol.clone(),
                "show".to_string(),
                "job".to_string(),
                job_id.clone(),
            ],
            Self::ShowClusterInfo { partition } => {
                let mut argv = vec![tools.sinfo.clone()];
                if let Some(partition) = non_blank(partition.as_deref()) {
                    argv.extend(["-p".to_string(), partition]);
                }
                argv
            }
        }
    }

    /// Short progress label shown while the request is in flight.
    pub fn describe(&self) -> String {
        match self {
            Self::ListQueue { user: Some(user), .. } => format!("Running squeue for user {user}"),
            Self::ListQueue { job_id: Some(id), .. } => format!("Running squeue for job {id}"),
            Self::ListQueue { .. } => "Running squeue".to_string(),
            Self::CancelJob { job_id } => format!("Cancelling job {job_id}"),
            Self::CancelAllForUser { user } => format!("Cancelling all jobs for user {user}"),
            Self::SubmitScript { path } => format!("Submitting {path}"),
            Self::ShowJobDetail { job_id } => format!("Getting info for job {job_id}"),
            Self::ShowClusterInfo { partition: Some(p) } => {
                format!("Getting partition info for {p}")
            }
            Self::ShowClusterInfo { partition: None } => "Getting cluster info".to_string(),
            Self::ReadJobOutputFile { job_id, stream } => {
                format!("Reading {stream} of job {job_id}")
            }
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(request: CommandRequest) -> Vec<String> {
        request.argv(&ToolsConfig::default())
    }

    #[test]
    fn list_queue_appends_optional_filters() {
        assert_eq!(argv(CommandRequest::list_queue(None)), ["squeue"]);
        assert_eq!(
            argv(CommandRequest::list_queue(Some("alice"))),
            ["squeue", "-u", "alice"]
        );
        assert_eq!(
            argv(CommandRequest::ListQueue {
                user: Some("alice".to_string()),
                job_id: Some("42".to_string()),
            }),
            ["squeue", "-u", "alice", "-j", "42"]
        );
    }

    #[test]
    fn blank_filters_are_dropped() {
        assert_eq!(argv(CommandRequest::list_queue(Some("   "))), ["squeue"]);
        assert_eq!(argv(CommandRequest::cluster_info(Some(""))), ["sinfo"]);
    }

    #[test]
    fn job_operations_use_fixed_templates() {
        assert_eq!(
            argv(CommandRequest::CancelJob {
                job_id: "123".to_string()
            }),
            ["scancel", "123"]
        );
        assert_eq!(
            argv(CommandRequest::CancelAllForUser {
                user: "bob".to_string()
            }),
            ["scancel", "-u", "bob"]
        );
        assert_eq!(
            argv(CommandRequest::SubmitScript {
                path: "run.sh".to_string()
            }),
            ["sbatch", "run.sh"]
        );
        assert_eq!(
            argv(CommandRequest::ShowJobDetail {
                job_id: "7".to_string()
            }),
            ["scontrol", "show", "job", "7"]
        );
        assert_eq!(
            argv(CommandRequest::cluster_info(Some("gpu"))),
            ["sinfo", "-p", "gpu"]
        );
    }

    #[test]
    fn configured_tool_names_are_used() {
        let tools = ToolsConfig {
            squeue: "/opt/slurm/bin/squeue".to_string(),
            ..ToolsConfig::default()
        };
        assert_eq!(
            CommandRequest::list_queue(None).argv(&tools),
            ["/opt/slurm/bin/squeue"]
        );
    }
}
