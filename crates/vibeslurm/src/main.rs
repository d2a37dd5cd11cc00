mod cli;
mod headless;
mod logging;
mod ui;

use crate::cli::Args;
use crate::logging::{init_tracing, LogSinks};
use anyhow::Context;
use clap::Parser;
use slurm_core::{Config, SlurmCommands};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG: &str = "config/vibeslurm.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let sinks = if args.log_to_stderr && args.command.is_some() {
        LogSinks::FileAndStderr
    } else {
        LogSinks::FileOnly
    };
    let _file_guard = init_tracing(&args.log_dir, sinks)
        .with_context(|| format!("failed to init logging in {}", args.log_dir.display()))?;

    let mut config = load_config(args.config.as_deref())?;
    if args.user.is_some() {
        config.default_user = args.user.clone();
    }
    if args.auto_refresh {
        config.refresh.auto = true;
    }
    let commands = SlurmCommands::from_config(&config);

    match args.command {
        Some(command) => headless::run(command, &commands, &config).await,
        None => ui::run(config, commands).await,
    }
}

fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    if let Some(path) = explicit {
        return Config::load(path);
    }
    let default_path = PathBuf::from(DEFAULT_CONFIG);
    if default_path.is_file() {
        return Config::load(&default_path);
    }
    tracing::debug!("no config file found, using defaults");
    Ok(Config::default())
}
