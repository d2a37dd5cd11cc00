use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "vibeslurm",
    version,
    about = "Terminal front-end for SLURM job queues"
)]
pub(crate) struct Args {
    /// TOML config; defaults to config/vibeslurm.toml when that file exists.
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,
    #[arg(long, default_value = "logs")]
    pub(crate) log_dir: PathBuf,
    #[arg(long, default_value_t = false)]
    pub(crate) log_to_stderr: bool,
    /// Initial queue user filter.
    #[arg(short, long)]
    pub(crate) user: Option<String>,
    #[arg(long, default_value_t = false)]
    pub(crate) auto_refresh: bool,
    #[command(subcommand)]
    pub(crate) command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum CliCommand {
    /// List queued and running jobs.
    Queue {
        #[arg(short, long)]
        user: Option<String>,
        #[arg(short, long)]
        job: Option<String>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Cancel one job.
    Cancel {
        job_id: String,
        #[arg(short, long, default_value_t = false)]
        yes: bool,
    },
    /// Cancel every job owned by a user.
    CancelUser {
        user: String,
        #[arg(short, long, default_value_t = false)]
        yes: bool,
    },
    /// Submit a batch script.
    Submit { script: PathBuf },
    /// Show the detail report of a job.
    Info {
        job_id: String,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Show partition status.
    Sinfo {
        #[arg(short, long)]
        partition: Option<String>,
    },
    /// Print a job's output file.
    Output {
        job_id: String,
        #[arg(long, default_value_t = false)]
        stderr: bool,
    },
    /// Follow a job's output files until interrupted.
    Tail { job_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_starts_the_terminal_ui() {
        let args = Args::try_parse_from(["vibeslurm", "-u", "alice"]).expect("parse");
        assert!(args.command.is_none());
        assert_eq!(args.user.as_deref(), Some("alice"));
    }

    #[test]
    fn queue_subcommand_takes_filters() {
        let args = Args::try_parse_from(["vibeslurm", "queue", "-u", "bob", "-j", "12", "--json"])
            .expect("parse");
        match args.command {
            Some(CliCommand::Queue { user, job, json }) => {
                assert_eq!(user.as_deref(), Some("bob"));
                assert_eq!(job.as_deref(), Some("12"));
                assert!(json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cancel_user_is_kebab_case() {
        let args =
            Args::try_parse_from(["vibeslurm", "cancel-user", "carol", "--yes"]).expect("parse");
        assert!(matches!(
            args.command,
            Some(CliCommand::CancelUser { yes: true, .. })
        ));
    }
}
