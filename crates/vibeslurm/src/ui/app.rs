use std::time::{Duration, Instant};

use ratatui::widgets::TableState;
use slurm_core::{
    extract_output_paths, parse_queue, CommandOutcome, CommandRequest, Completion, Config,
    JobRow, OutputStream, StreamPoll, SubmitOutcome, TailSession,
};

use super::text::sanitize_text_for_tui;

pub(crate) const CONSOLE_LIMIT: usize = 2000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ConsoleLevel {
    Output,
    Info,
    Rule,
    Warn,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ConsoleLine {
    pub(crate) level: ConsoleLevel,
    pub(crate) text: String,
}

#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum ViewMode {
    #[default]
    Normal,
    Tail,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum JobAction {
    Cancel,
    Info,
    ReadStdout,
    ReadStderr,
    Tail,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PromptKind {
    UserFilter,
    JobId(JobAction),
    ScriptPath,
    Partition,
    CancelAllUser,
}

impl PromptKind {
    pub(crate) fn title(self) -> &'static str {
        match self {
            Self::UserFilter => "User filter (empty for all users)",
            Self::JobId(_) => "Job ID",
            Self::ScriptPath => "Batch script path",
            Self::Partition => "Partition (empty for all)",
            Self::CancelAllUser => "Cancel all jobs of user",
        }
    }
}

pub(crate) struct Prompt {
    pub(crate) kind: PromptKind,
    pub(crate) input: String,
}

/// A destructive request waiting for a yes/no answer.
pub(crate) struct PendingConfirm {
    pub(crate) request: CommandRequest,
    pub(crate) question: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Purpose {
    Show,
    OpenTail { job_id: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Submission {
    pub(crate) request: CommandRequest,
    pub(crate) purpose: Purpose,
}

/// Sanitised logical lines of one tailed stream. The last line stays open until its newline
/// arrives.
pub(crate) struct TailBuffer {
    lines: Vec<String>,
    pub(crate) waiting: bool,
    pub(crate) error: Option<String>,
}

impl Default for TailBuffer {
    fn default() -> Self {
        Self {
            lines: vec![String::new()],
            waiting: false,
            error: None,
        }
    }
}

impl TailBuffer {
    pub(crate) fn append(&mut self, chunk: &str) {
        let cleaned = sanitize_text_for_tui(chunk);
        let mut parts = cleaned.split('\n');
        if let (Some(first), Some(open)) = (parts.next(), self.lines.last_mut()) {
            open.push_str(first);
        }
        self.lines.extend(parts.map(str::to_string));
    }

    /// Lines to display; an empty open line is left out.
    pub(crate) fn lines(&self) -> &[String] {
        match self.lines.split_last() {
            Some((open, done)) if open.is_empty() => done,
            _ => &self.lines,
        }
    }
}

pub(crate) struct TailView {
    pub(crate) session: TailSession,
    pub(crate) focus: OutputStream,
    /// Logical lines scrolled back from the bottom of the focused stream.
    pub(crate) scroll: usize,
    stdout: TailBuffer,
    stderr: TailBuffer,
}

impl TailView {
    fn new(session: TailSession) -> Self {
        Self {
            session,
            focus: OutputStream::Stdout,
            scroll: 0,
            stdout: TailBuffer::default(),
            stderr: TailBuffer::default(),
        }
    }

    pub(crate) fn buffer(&self, stream: OutputStream) -> &TailBuffer {
        match stream {
            OutputStream::Stdout => &self.stdout,
            OutputStream::Stderr => &self.stderr,
        }
    }

    fn buffer_mut(&mut self, stream: OutputStream) -> &mut TailBuffer {
        match stream {
            OutputStream::Stdout => &mut self.stdout,
            OutputStream::Stderr => &mut self.stderr,
        }
    }

    fn apply(&mut self, stream: OutputStream, poll: StreamPoll) {
        let buffer = self.buffer_mut(stream);
        match poll {
            StreamPoll::NotYetAvailable => buffer.waiting = true,
            StreamPoll::NewData(chunk) => {
                buffer.waiting = false;
                buffer.error = None;
                buffer.append(&chunk);
            }
            StreamPoll::ReadError(message) => {
                buffer.waiting = false;
                buffer.error = Some(message);
            }
            StreamPoll::NoPath | StreamPoll::NoNewData => {}
        }
    }

    fn max_scroll(&self) -> usize {
        self.buffer(self.focus).lines().len().saturating_sub(1)
    }
}

pub(crate) struct AppState {
    pub(crate) user_filter: Option<String>,
    pub(crate) auto_refresh: bool,
    pub(crate) refresh_interval: Duration,
    last_refresh: Option<Instant>,
    pub(crate) jobs: Vec<JobRow>,
    pub(crate) selected: usize,
    pub(crate) table_state: TableState,
    pub(crate) console: Vec<ConsoleLine>,
    pub(crate) console_scroll: usize,
    pub(crate) running: Option<String>,
    pub(crate) notice: Option<String>,
    pub(crate) prompt: Option<Prompt>,
    pub(crate) confirm: Option<PendingConfirm>,
    pub(crate) alert: Option<String>,
    pub(crate) view_mode: ViewMode,
    pub(crate) tail: Option<TailView>,
    pending_tail: Option<(u64, String)>,
    outbox: Vec<Submission>,
    pub(crate) confirm_quit: bool,
}

impl AppState {
    pub(crate) fn new(config: &Config) -> Self {
        Self {
            user_filter: config.default_user.clone(),
            auto_refresh: config.refresh.auto,
            refresh_interval: config.refresh.interval(),
            last_refresh: None,
            jobs: Vec::new(),
            selected: 0,
            table_state: TableState::default(),
            console: Vec::new(),
            console_scroll: 0,
            running: None,
            notice: None,
            prompt: None,
            confirm: None,
            alert: None,
            view_mode: ViewMode::Normal,
            tail: None,
            pending_tail: None,
            outbox: Vec::new(),
            confirm_quit: false,
        }
    }

    pub(crate) fn selected_job(&self) -> Option<&JobRow> {
        self.jobs.get(self.selected)
    }

    pub(crate) fn select_next(&mut self) {
        if !self.jobs.is_empty() {
            self.selected = (self.selected + 1).min(self.jobs.len() - 1);
        }
        self.sync_selection();
    }

    pub(crate) fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
        self.sync_selection();
    }

    fn sync_selection(&mut self) {
        if self.jobs.is_empty() {
            self.table_state.select(None);
        } else {
            self.table_state.select(Some(self.selected));
        }
    }

    pub(crate) fn request_refresh(&mut self) {
        self.last_refresh = Some(Instant::now());
        self.queue(CommandRequest::list_queue(self.user_filter.as_deref()));
    }

    pub(crate) fn refresh_due(&self, now: Instant) -> bool {
        self.auto_refresh
            && self
                .last_refresh
                .map_or(true, |last| now.duration_since(last) >= self.refresh_interval)
    }

    /// Restarts the refresh clock without queueing anything.
    pub(crate) fn mark_refreshed(&mut self, now: Instant) {
        self.last_refresh = Some(now);
    }

    pub(crate) fn toggle_auto_refresh(&mut self) {
        self.auto_refresh = !self.auto_refresh;
        let state = if self.auto_refresh { "on" } else { "off" };
        self.push_console(ConsoleLevel::Info, format!("Auto-refresh {state}"));
    }

    pub(crate) fn set_user_filter(&mut self, input: &str) {
        let user = input.trim();
        self.user_filter = (!user.is_empty()).then(|| user.to_string());
        self.request_refresh();
    }

    pub(crate) fn queue(&mut self, request: CommandRequest) {
        self.outbox.push(Submission {
            request,
            purpose: Purpose::Show,
        });
    }

    pub(crate) fn queue_tail(&mut self, job_id: String) {
        self.outbox.push(Submission {
            request: CommandRequest::ShowJobDetail {
                job_id: job_id.clone(),
            },
            purpose: Purpose::OpenTail { job_id },
        });
    }

    pub(crate) fn take_submissions(&mut self) -> Vec<Submission> {
        std::mem::take(&mut self.outbox)
    }

    pub(crate) fn record_submit(&mut self, submission: Submission, outcome: SubmitOutcome) {
        match outcome {
            SubmitOutcome::Started { ticket } => {
                self.notice = None;
                self.push_console(
                    ConsoleLevel::Info,
                    format!("> {}", submission.request.describe()),
                );
                if let Purpose::OpenTail { job_id } = submission.purpose {
                    self.pending_tail = Some((ticket, job_id));
                }
            }
            SubmitOutcome::Busy { notice } => {
                self.push_console(ConsoleLevel::Warn, notice.clone());
                self.notice = Some(notice);
            }
        }
    }

    pub(crate) fn ask_confirm(&mut self, request: CommandRequest) {
        let question = match &request {
            CommandRequest::CancelJob { job_id } => format!("Cancel job {job_id}?"),
            CommandRequest::CancelAllForUser { user } => {
                format!("Cancel ALL jobs of user {user}?")
            }
            other => format!("{}?", other.describe()),
        };
        self.confirm = Some(PendingConfirm { request, question });
    }

    pub(crate) fn answer_confirm(&mut self, yes: bool) {
        if let Some(pending) = self.confirm.take() {
            if yes {
                self.queue(pending.request);
            }
        }
    }

    pub(crate) fn open_prompt(&mut self, kind: PromptKind, initial: &str) {
        self.prompt = Some(Prompt {
            kind,
            input: initial.to_string(),
        });
    }

    pub(crate) fn submit_prompt(&mut self) {
        let Some(prompt) = self.prompt.take() else {
            return;
        };
        let value = prompt.input.trim().to_string();
        match prompt.kind {
            PromptKind::UserFilter => self.set_user_filter(&value),
            PromptKind::Partition => self.queue(CommandRequest::cluster_info(Some(&value))),
            _ if value.is_empty() => {}
            PromptKind::ScriptPath => self.queue(CommandRequest::SubmitScript { path: value }),
            PromptKind::CancelAllUser => {
                self.ask_confirm(CommandRequest::CancelAllForUser { user: value })
            }
            PromptKind::JobId(action) => self.job_action(action, value),
        }
    }

    /// Runs `action` on the selected job, or asks for a job id when nothing is selected.
    pub(crate) fn act_on_selected(&mut self, action: JobAction) {
        match self.selected_job().map(|job| job.job_id.clone()) {
            Some(job_id) => self.job_action(action, job_id),
            None => self.open_prompt(PromptKind::JobId(action), ""),
        }
    }

    fn job_action(&mut self, action: JobAction, job_id: String) {
        match action {
            JobAction::Cancel => self.ask_confirm(CommandRequest::CancelJob { job_id }),
            JobAction::Info => self.queue(CommandRequest::ShowJobDetail { job_id }),
            JobAction::ReadStdout => self.queue(CommandRequest::ReadJobOutputFile {
                job_id,
                stream: OutputStream::Stdout,
            }),
            JobAction::ReadStderr => self.queue(CommandRequest::ReadJobOutputFile {
                job_id,
                stream: OutputStream::Stderr,
            }),
            JobAction::Tail => self.queue_tail(job_id),
        }
    }

    pub(crate) fn handle_completion(&mut self, completion: Completion) {
        let tail_job = match self.pending_tail.take() {
            Some((ticket, job_id)) if ticket == completion.ticket => Some(job_id),
            other => {
                self.pending_tail = other;
                None
            }
        };
        let message = match completion.outcome {
            CommandOutcome::Failure { message } => {
                self.push_console(ConsoleLevel::Error, message.clone());
                self.push_rule();
                self.alert = Some(message);
                return;
            }
            CommandOutcome::Success { text } => text,
        };

        if let Some(job_id) = tail_job {
            self.open_tail(job_id, &message);
            return;
        }
        match completion.request {
            CommandRequest::ListQueue { .. } => {
                self.replace_jobs(parse_queue(&message));
                self.push_console(
                    ConsoleLevel::Info,
                    format!("Queue refreshed: {} jobs", self.jobs.len()),
                );
            }
            CommandRequest::CancelJob { .. }
            | CommandRequest::CancelAllForUser { .. }
            | CommandRequest::SubmitScript { .. } => {
                self.push_output(&message);
                self.request_refresh();
            }
            CommandRequest::ShowJobDetail { .. }
            | CommandRequest::ShowClusterInfo { .. }
            | CommandRequest::ReadJobOutputFile { .. } => self.push_output(&message),
        }
        self.push_rule();
    }

    fn replace_jobs(&mut self, jobs: Vec<JobRow>) {
        let selected_id = self.selected_job().map(|job| job.job_id.clone());
        self.jobs = jobs;
        self.selected = selected_id
            .and_then(|id| self.jobs.iter().position(|job| job.job_id == id))
            .unwrap_or_else(|| self.selected.min(self.jobs.len().saturating_sub(1)));
        self.sync_selection();
    }

    fn open_tail(&mut self, job_id: String, report: &str) {
        match TailSession::open(job_id, extract_output_paths(report)) {
            Ok(session) => {
                self.push_console(
                    ConsoleLevel::Info,
                    format!("Tailing output of job {}", session.job_id()),
                );
                self.tail = Some(TailView::new(session));
                self.view_mode = ViewMode::Tail;
                self.poll_tail();
            }
            Err(err) => {
                let message = err.to_string();
                self.push_console(ConsoleLevel::Error, message.clone());
                self.alert = Some(message);
            }
        }
        self.push_rule();
    }

    pub(crate) fn close_tail(&mut self) {
        if let Some(tail) = self.tail.take() {
            self.push_console(
                ConsoleLevel::Info,
                format!("Stopped tailing job {}", tail.session.job_id()),
            );
        }
        self.view_mode = ViewMode::Normal;
    }

    pub(crate) fn poll_tail(&mut self) {
        let Some(tail) = self.tail.as_mut() else {
            return;
        };
        let update = tail.session.poll();
        let mut errors = Vec::new();
        for (stream, poll) in [
            (OutputStream::Stdout, update.stdout),
            (OutputStream::Stderr, update.stderr),
        ] {
            if let StreamPoll::ReadError(message) = &poll {
                errors.push(format!("{stream}: {message}"));
            }
            tail.apply(stream, poll);
        }
        for message in errors {
            self.push_console(ConsoleLevel::Error, message);
        }
    }

    pub(crate) fn switch_tail_focus(&mut self) {
        if let Some(tail) = self.tail.as_mut() {
            tail.focus = match tail.focus {
                OutputStream::Stdout => OutputStream::Stderr,
                OutputStream::Stderr => OutputStream::Stdout,
            };
            tail.scroll = 0;
        }
    }

    pub(crate) fn scroll_tail(&mut self, up: bool, lines: usize) {
        if let Some(tail) = self.tail.as_mut() {
            tail.scroll = if up {
                tail.scroll.saturating_add(lines).min(tail.max_scroll())
            } else {
                tail.scroll.saturating_sub(lines)
            };
        }
    }

    pub(crate) fn scroll_console(&mut self, up: bool, lines: usize) {
        self.console_scroll = if up {
            self.console_scroll
                .saturating_add(lines)
                .min(self.console.len())
        } else {
            self.console_scroll.saturating_sub(lines)
        };
    }

    fn push_output(&mut self, text: &str) {
        let cleaned = sanitize_text_for_tui(text);
        for line in cleaned.trim_end_matches('\n').split('\n') {
            self.push_console(ConsoleLevel::Output, line.to_string());
        }
    }

    fn push_rule(&mut self) {
        self.push_console(ConsoleLevel::Rule, String::new());
    }

    pub(crate) fn push_console(&mut self, level: ConsoleLevel, text: String) {
        self.console.push(ConsoleLine { level, text });
        if self.console.len() > CONSOLE_LIMIT {
            let excess = self.console.len() - CONSOLE_LIMIT;
            self.console.drain(..excess);
        }
    }
}
