use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "vibeslurm.log";
const FILE_FILTER_VAR: &str = "VIBESLURM_LOG";
const STDERR_FILTER_VAR: &str = "VIBESLURM_STDERR_LOG";
const FILE_DEFAULT: &str = "info";
/// Terminal output of one-shot commands stays quiet unless something goes wrong.
const STDERR_DEFAULT: &str = "warn";

/// Where log records go for this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LogSinks {
    /// The terminal UI owns the screen; records only go to the log file.
    FileOnly,
    FileAndStderr,
}

pub(crate) fn init_tracing(log_dir: &Path, sinks: LogSinks) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_target(false)
        .json()
        .with_filter(layer_filter(FILE_FILTER_VAR, FILE_DEFAULT));

    let stderr_layer = (sinks == LogSinks::FileAndStderr).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .without_time()
            .with_filter(layer_filter(STDERR_FILTER_VAR, STDERR_DEFAULT))
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .init();
    Ok(file_guard)
}

fn layer_filter(var: &str, default: &str) -> EnvFilter {
    let directives = filter_directives(
        std::env::var(var).ok(),
        std::env::var("RUST_LOG").ok(),
        default,
    );
    EnvFilter::try_new(&directives).unwrap_or_else(|err| {
        eprintln!("ignoring invalid log filter {directives:?}: {err}");
        EnvFilter::new(default)
    })
}

/// The per-sink variable wins over `RUST_LOG`, which wins over the sink default.
fn filter_directives(own: Option<String>, shared: Option<String>, default: &str) -> String {
    [own, shared]
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_variable_overrides_rust_log() {
        let directives = filter_directives(
            Some("slurm_core=debug".to_string()),
            Some("trace".to_string()),
            FILE_DEFAULT,
        );
        assert_eq!(directives, "slurm_core=debug");
    }

    #[test]
    fn blank_values_fall_through_to_default() {
        assert_eq!(
            filter_directives(Some("  ".to_string()), None, STDERR_DEFAULT),
            "warn"
        );
        assert_eq!(
            filter_directives(None, Some("debug".to_string()), STDERR_DEFAULT),
            "debug"
        );
    }
}
