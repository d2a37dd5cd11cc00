pub mod commands;
pub mod config;
pub mod detail;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod queue;
pub mod request;
pub mod tailer;

#[cfg(test)]
pub(crate) mod test_utils;

pub use commands::SlurmCommands;
pub use config::{Config, LimitsConfig, RefreshConfig, TailConfig, ToolsConfig};
pub use detail::{extract_output_paths, parse_job_detail, JobDetailMap, OutputPaths};
pub use dispatcher::{CommandOutcome, Completion, Dispatcher, SubmitOutcome};
pub use error::SlurmError;
pub use executor::{CommandResult, CommandRunner, ProcessExecutor};
pub use queue::{parse_queue, JobRow, JobStateClass};
pub use request::{CommandRequest, OutputStream};
pub use tailer::{StreamPoll, TailSession, TailUpdate};
