use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::detail::OutputPaths;
use crate::error::SlurmError;
use crate::request::OutputStream;

/// Result of polling one stream of a tail session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamPoll {
    /// The job report had no path for this stream.
    NoPath,
    NewData(String),
    NoNewData,
    /// The file does not exist yet; the job may not have started writing.
    NotYetAvailable,
    /// A read failure other than a missing file. Reported once per stream per session; later
    /// failures poll as `NoNewData`.
    ReadError(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailUpdate {
    pub stdout: StreamPoll,
    pub stderr: StreamPoll,
}

impl TailUpdate {
    pub fn has_new_data(&self) -> bool {
        matches!(self.stdout, StreamPoll::NewData(_)) || matches!(self.stderr, StreamPoll::NewData(_))
    }
}

#[derive(Debug)]
struct TailStream {
    path: PathBuf,
    offset: u64,
    partial: Vec<u8>,
    text: String,
    error_reported: bool,
}

impl TailStream {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            offset: 0,
            partial: Vec::new(),
            text: String::new(),
            error_reported: false,
        }
    }

    fn poll(&mut self) -> StreamPoll {
        let bytes = match self.read_appended() {
            Ok(bytes) => bytes,
            Err(err) => return self.read_failed(&err),
        };
        if bytes.is_empty() {
            return StreamPoll::NoNewData;
        }
        let chunk = self.decode(bytes);
        if chunk.is_empty() {
            return StreamPoll::NoNewData;
        }
        self.text.push_str(&chunk);
        StreamPoll::NewData(chunk)
    }

    fn read_appended(&mut self) -> io::Result<Vec<u8>> {
        let mut file = File::open(&self.path)?;
        let len = file.metadata()?.len();
        if len < self.offset {
            tracing::debug!(
                path = %self.path.display(),
                len,
                offset = self.offset,
                "tailed file is shorter than the stored offset"
            );
        }
        file.seek(SeekFrom::Start(self.offset))?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        self.offset += buffer.len() as u64;
        Ok(buffer)
    }

    fn read_failed(&mut self, err: &io::Error) -> StreamPoll {
        match SlurmError::from_file_io(&self.path, err) {
            SlurmError::FileUnavailable { .. } => StreamPoll::NotYetAvailable,
            _ if self.error_reported => StreamPoll::NoNewData,
            other => {
                self.error_reported = true;
                tracing::warn!(path = %self.path.display(), error = %err, "tail read failed");
                StreamPoll::ReadError(other.to_string())
            }
        }
    }

    /// Decodes appended bytes, holding back a trailing incomplete UTF-8 sequence until the rest
    /// of it arrives.
    fn decode(&mut self, bytes: Vec<u8>) -> String {
        let mut buffer = std::mem::take(&mut self.partial);
        buffer.extend_from_slice(&bytes);
        let complete = match std::str::from_utf8(&buffer) {
            Ok(_) => buffer.len(),
            Err(err) if err.error_len().is_none() => err.valid_up_to(),
            Err(_) => buffer.len(),
        };
        self.partial = buffer.split_off(complete);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// Incremental reader for one job's output files. Offsets only move forward for the lifetime of
/// the session.
#[derive(Debug)]
pub struct TailSession {
    job_id: String,
    stdout: Option<TailStream>,
    stderr: Option<TailStream>,
}

impl TailSession {
    pub fn new(job_id: impl Into<String>, paths: OutputPaths) -> Self {
        Self {
            job_id: job_id.into(),
            stdout: paths.stdout.map(TailStream::new),
            stderr: paths.stderr.map(TailStream::new),
        }
    }

    /// Like [`TailSession::new`], but refuses a job whose report names neither stream.
    pub fn open(job_id: impl Into<String>, paths: OutputPaths) -> Result<Self, SlurmError> {
        let job_id = job_id.into();
        if paths.is_empty() {
            return Err(SlurmError::NoOutputFileConfigured {
                job_id,
                stream: OutputStream::Stdout,
            });
        }
        tracing::info!(
            job_id = %job_id,
            stdout = ?paths.stdout,
            stderr = ?paths.stderr,
            "tail session opened"
        );
        Ok(Self::new(job_id, paths))
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn poll(&mut self) -> TailUpdate {
        TailUpdate {
            stdout: poll_stream(self.stdout.as_mut()),
            stderr: poll_stream(self.stderr.as_mut()),
        }
    }

    /// Everything read from the stream so far.
    pub fn text(&self, stream: OutputStream) -> &str {
        self.stream(stream)
            .map(|tail| tail.text.as_str())
            .unwrap_or_default()
    }

    pub fn offset(&self, stream: OutputStream) -> u64 {
        self.stream(stream).map(|tail| tail.offset).unwrap_or(0)
    }

    pub fn path(&self, stream: OutputStream) -> Option<&Path> {
        self.stream(stream).map(|tail| tail.path.as_path())
    }

    fn stream(&self, stream: OutputStream) -> Option<&TailStream> {
        match stream {
            OutputStream::Stdout => self.stdout.as_ref(),
            OutputStream::Stderr => self.stderr.as_ref(),
        }
    }
}

fn poll_stream(stream: Option<&mut TailStream>) -> StreamPoll {
    match stream {
        Some(stream) => stream.poll(),
        None => StreamPoll::NoPath,
    }
}
