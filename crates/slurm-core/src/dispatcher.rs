use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::commands::SlurmCommands;
use crate::request::CommandRequest;

const COMPLETION_BUFFER: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Success { text: String },
    Failure { message: String },
}

/// Delivered exactly once for every accepted submission.
#[derive(Debug, Clone)]
pub struct Completion {
    pub ticket: u64,
    pub request: CommandRequest,
    pub outcome: CommandOutcome,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Started { ticket: u64 },
    /// Another command is in flight; nothing was attempted.
    Busy { notice: String },
}

enum DispatchState {
    Idle,
    Running {
        ticket: u64,
        label: String,
        task: Option<JoinHandle<()>>,
    },
}

struct Inner {
    state: DispatchState,
    next_ticket: u64,
}

/// Runs at most one external command at a time, off the caller's thread.
pub struct Dispatcher {
    commands: SlurmCommands,
    inner: Arc<Mutex<Inner>>,
    completions: mpsc::Sender<Completion>,
    runtime: Handle,
}

impl Dispatcher {
    pub fn new(commands: SlurmCommands, runtime: Handle) -> (Self, mpsc::Receiver<Completion>) {
        let (completions, completion_rx) = mpsc::channel(COMPLETION_BUFFER);
        let dispatcher = Self {
            commands,
            inner: Arc::new(Mutex::new(Inner {
                state: DispatchState::Idle,
                next_ticket: 1,
            })),
            completions,
            runtime,
        };
        (dispatcher, completion_rx)
    }

    /// Starts `request` on a worker task and returns immediately. Rejected, not queued, while
    /// another request is running.
    pub fn submit(&self, request: CommandRequest) -> SubmitOutcome {
        let mut inner = lock(&self.inner);
        if let DispatchState::Running { label, ticket, .. } = &inner.state {
            tracing::warn!(
                running_ticket = *ticket,
                running = %label,
                rejected = %request.describe(),
                "dispatcher busy, request dropped"
            );
            return SubmitOutcome::Busy {
                notice: format!("A command is already running ({label})"),
            };
        }

        let ticket = inner.next_ticket;
        inner.next_ticket += 1;
        let label = request.describe();
        tracing::info!(ticket, command = %label, "dispatching command");

        let worker = Worker {
            inner: Arc::clone(&self.inner),
            completions: self.completions.clone(),
            ticket,
            request: Some(request.clone()),
            started_at: Instant::now(),
        };
        let commands = self.commands.clone();
        let task = self
            .runtime
            .spawn(async move { worker.run(commands, request).await });
        inner.state = DispatchState::Running {
            ticket,
            label,
            task: Some(task),
        };
        SubmitOutcome::Started { ticket }
    }

    pub fn is_busy(&self) -> bool {
        matches!(lock(&self.inner).state, DispatchState::Running { .. })
    }

    /// Label of the in-flight request, if any.
    pub fn running(&self) -> Option<String> {
        match &lock(&self.inner).state {
            DispatchState::Running { label, .. } => Some(label.clone()),
            DispatchState::Idle => None,
        }
    }

    /// Waits for the in-flight worker, if any, to finish.
    pub async fn wait_idle(&self) {
        let task = match &mut lock(&self.inner).state {
            DispatchState::Running { task, .. } => task.take(),
            DispatchState::Idle => None,
        };
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

struct Worker {
    inner: Arc<Mutex<Inner>>,
    completions: mpsc::Sender<Completion>,
    ticket: u64,
    request: Option<CommandRequest>,
    started_at: Instant,
}

impl Worker {
    async fn run(mut self, commands: SlurmCommands, request: CommandRequest) {
        let outcome = match commands.run(&request).await {
            Ok(text) => CommandOutcome::Success { text },
            Err(err) => {
                tracing::warn!(ticket = self.ticket, error = %err, "command failed");
                CommandOutcome::Failure {
                    message: err.to_string(),
                }
            }
        };
        let completion = self.finish(outcome);
        if let Some(completion) = completion {
            let _ = self.completions.send(completion).await;
        }
    }

    /// Returns the dispatcher to idle and builds the completion. Only the first call yields one.
    fn finish(&mut self, outcome: CommandOutcome) -> Option<Completion> {
        let request = self.request.take()?;
        lock(&self.inner).state = DispatchState::Idle;
        let elapsed = self.started_at.elapsed();
        tracing::info!(
            ticket = self.ticket,
            elapsed_ms = elapsed.as_millis() as u64,
            success = matches!(outcome, CommandOutcome::Success { .. }),
            "command finished"
        );
        Some(Completion {
            ticket: self.ticket,
            request,
            outcome,
            elapsed,
        })
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        let completion = self.finish(CommandOutcome::Failure {
            message: "command worker stopped unexpectedly".to_string(),
        });
        if let Some(completion) = completion {
            let _ = self.completions.try_send(completion);
        }
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
