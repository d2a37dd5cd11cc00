use std::io::{self, BufRead, Write};

use anyhow::Context;
use slurm_core::{
    parse_job_detail, CommandRequest, Config, OutputStream, SlurmCommands, StreamPoll,
    TailSession,
};

use crate::cli::CliCommand;

pub(crate) async fn run(
    command: CliCommand,
    commands: &SlurmCommands,
    config: &Config,
) -> anyhow::Result<()> {
    match command {
        CliCommand::Queue { user, job, json } => {
            let user = user.or_else(|| config.default_user.clone());
            let request = CommandRequest::ListQueue { user, job_id: job };
            let output = commands.run(&request).await?;
            if json {
                let rows = slurm_core::parse_queue(&output);
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                print!("{output}");
            }
        }
        CliCommand::Cancel { job_id, yes } => {
            if !yes && !confirm(&format!("Cancel job {job_id}?"))? {
                println!("aborted");
                return Ok(());
            }
            println!("{}", commands.scancel(&job_id).await?.trim_end());
        }
        CliCommand::CancelUser { user, yes } => {
            if !yes && !confirm(&format!("Cancel ALL jobs for user {user}?"))? {
                println!("aborted");
                return Ok(());
            }
            println!("{}", commands.scancel_user(&user).await?.trim_end());
        }
        CliCommand::Submit { script } => {
            let script = script.to_string_lossy();
            print!("{}", commands.sbatch(&script).await?);
        }
        CliCommand::Info { job_id, json } => {
            let report = commands.scontrol_show_job(&job_id).await?;
            if json {
                let detail = parse_job_detail(&report);
                println!("{}", serde_json::to_string_pretty(&detail)?);
            } else {
                print!("{report}");
            }
        }
        CliCommand::Sinfo { partition } => {
            print!("{}", commands.sinfo(partition.as_deref()).await?);
        }
        CliCommand::Output { job_id, stderr } => {
            let stream = if stderr {
                OutputStream::Stderr
            } else {
                OutputStream::Stdout
            };
            print!("{}", commands.read_output_file(&job_id, stream).await?);
        }
        CliCommand::Tail { job_id } => tail(commands, config, &job_id).await?,
    }
    Ok(())
}

async fn tail(commands: &SlurmCommands, config: &Config, job_id: &str) -> anyhow::Result<()> {
    let paths = commands.output_paths(job_id).await?;
    let mut session = TailSession::open(job_id, paths)?;
    let mut waiting_reported = [false, false];
    let mut ticker = tokio::time::interval(config.tail.poll_interval());
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let update = session.poll();
                emit(&session, OutputStream::Stdout, update.stdout, &mut waiting_reported[0])?;
                emit(&session, OutputStream::Stderr, update.stderr, &mut waiting_reported[1])?;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

fn emit(
    session: &TailSession,
    stream: OutputStream,
    poll: StreamPoll,
    waiting_reported: &mut bool,
) -> anyhow::Result<()> {
    match poll {
        StreamPoll::NewData(text) => match stream {
            OutputStream::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(text.as_bytes())?;
                out.flush()?;
            }
            OutputStream::Stderr => {
                let mut err = io::stderr().lock();
                err.write_all(text.as_bytes())?;
                err.flush()?;
            }
        },
        StreamPoll::NotYetAvailable if !*waiting_reported => {
            *waiting_reported = true;
            if let Some(path) = session.path(stream) {
                eprintln!("[waiting for {stream} file {}]", path.display());
            }
        }
        StreamPoll::ReadError(message) => eprintln!("[{stream} unavailable: {message}]"),
        StreamPoll::NoPath | StreamPoll::NoNewData | StreamPoll::NotYetAvailable => {}
    }
    Ok(())
}

fn confirm(question: &str) -> anyhow::Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::is_yes;

    #[test]
    fn only_explicit_yes_confirms() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("no"));
    }
}
