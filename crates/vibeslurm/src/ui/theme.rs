use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Span;
use ratatui::widgets::{Block, Borders};
use slurm_core::JobStateClass;

use super::app::ConsoleLevel;

pub(crate) struct Theme {
    frame: Color,
    heading: Color,
    body: Color,
    muted: Color,
    accent: Color,
    selection_bg: Color,
    running: Color,
    pending: Color,
    failed: Color,
}

impl Theme {
    pub(crate) fn dark() -> Self {
        Self {
            frame: Color::DarkGray,
            heading: Color::Blue,
            body: Color::White,
            muted: Color::Gray,
            accent: Color::Cyan,
            selection_bg: Color::DarkGray,
            running: Color::Green,
            pending: Color::Yellow,
            failed: Color::Red,
        }
    }

    pub(crate) fn block<'a>(&self, title: &'a str) -> Block<'a> {
        self.framed(title, self.frame)
    }

    /// Popups use a bold coloured frame; red for failures.
    pub(crate) fn popup_block<'a>(&self, title: &'a str, alert: bool) -> Block<'a> {
        let color = if alert { self.failed } else { self.accent };
        self.framed(title, color)
            .border_style(Style::default().fg(color).add_modifier(Modifier::BOLD))
    }

    fn framed<'a>(&self, title: &'a str, border: Color) -> Block<'a> {
        Block::default()
            .title(Span::styled(title, self.header_style()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
    }

    pub(crate) fn highlight_style(&self) -> Style {
        Style::default()
            .bg(self.selection_bg)
            .add_modifier(Modifier::BOLD | Modifier::REVERSED)
    }

    pub(crate) fn header_style(&self) -> Style {
        Style::default()
            .fg(self.heading)
            .add_modifier(Modifier::BOLD)
    }

    pub(crate) fn help_style(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub(crate) fn accent_style(&self) -> Style {
        Style::default().fg(self.accent).add_modifier(Modifier::BOLD)
    }

    pub(crate) fn warn_style(&self) -> Style {
        Style::default()
            .fg(self.pending)
            .add_modifier(Modifier::BOLD)
    }

    pub(crate) fn key_style(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub(crate) fn text_style(&self) -> Style {
        Style::default().fg(self.body)
    }

    pub(crate) fn dim_style(&self) -> Style {
        Style::default()
            .fg(self.muted)
            .add_modifier(Modifier::ITALIC)
    }

    /// Row colour for a job in the queue table.
    pub(crate) fn state_style(&self, class: JobStateClass) -> Style {
        let color = match class {
            JobStateClass::Running => self.running,
            JobStateClass::Pending => self.pending,
            JobStateClass::Completing => self.accent,
            JobStateClass::Failed => self.failed,
            JobStateClass::Other => self.body,
        };
        Style::default().fg(color)
    }

    pub(crate) fn console_style(&self, level: ConsoleLevel) -> Style {
        match level {
            ConsoleLevel::Output => self.text_style(),
            ConsoleLevel::Info => Style::default().fg(self.accent),
            ConsoleLevel::Rule => Style::default().fg(self.frame),
            ConsoleLevel::Warn => self.warn_style(),
            ConsoleLevel::Error => Style::default()
                .fg(self.failed)
                .add_modifier(Modifier::BOLD),
        }
    }
}
