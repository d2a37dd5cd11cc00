use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::request::OutputStream;

/// Everything that can go wrong between building an argv and handing text back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlurmError {
    Timeout { command: String, secs: u64 },
    NotFound { program: String },
    CommandFailed { tool: String, stderr: String },
    Unexpected { message: String },
    NoOutputFileConfigured { job_id: String, stream: OutputStream },
    FileUnavailable { path: PathBuf },
    FileAccessDenied { path: PathBuf },
}

impl SlurmError {
    pub(crate) fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    /// Maps a file read failure onto the file-related variants.
    pub(crate) fn from_file_io(path: &Path, err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::FileUnavailable {
                path: path.to_path_buf(),
            },
            io::ErrorKind::PermissionDenied => Self::FileAccessDenied {
                path: path.to_path_buf(),
            },
            _ => Self::unexpected(format!("read {}: {err}", path.display())),
        }
    }
}

impl fmt::Display for SlurmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { command, secs } => {
                write!(f, "command timed out after {secs}s: {command}")
            }
            Self::NotFound { program } => write!(f, "command not found: {program}"),
            Self::CommandFailed { tool, stderr } => {
                write!(f, "{tool} failed: {}", stderr.trim_end())
            }
            Self::Unexpected { message } => write!(f, "error running command: {message}"),
            Self::NoOutputFileConfigured { job_id, stream } => {
                write!(f, "no {stream} file configured for job {job_id}")
            }
            Self::FileUnavailable { path } => {
                write!(f, "file not available yet: {}", path.display())
            }
            Self::FileAccessDenied { path } => {
                write!(f, "permission denied reading {}", path.display())
            }
        }
    }
}

impl std::error::Error for SlurmError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_failed_message_names_tool_and_trims_stderr() {
        let err = SlurmError::CommandFailed {
            tool: "scancel".to_string(),
            stderr: "scancel: error: Invalid job id specified\n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "scancel failed: scancel: error: Invalid job id specified"
        );
    }

    #[test]
    fn file_io_errors_map_by_kind() {
        let path = Path::new("/tmp/job.out");
        let missing = io::Error::new(io::ErrorKind::NotFound, "gone");
        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "no");
        let other = io::Error::new(io::ErrorKind::Other, "disk on fire");
        assert!(matches!(
            SlurmError::from_file_io(path, &missing),
            SlurmError::FileUnavailable { .. }
        ));
        assert!(matches!(
            SlurmError::from_file_io(path, &denied),
            SlurmError::FileAccessDenied { .. }
        ));
        assert!(matches!(
            SlurmError::from_file_io(path, &other),
            SlurmError::Unexpected { .. }
        ));
    }
}
