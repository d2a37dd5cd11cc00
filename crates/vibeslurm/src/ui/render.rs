use ratatui::layout::{Constraint, Direction, Flex, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Cell, Clear, Paragraph, Row, Table, Wrap};
use slurm_core::OutputStream;

use super::app::{AppState, ConsoleLevel, TailView, ViewMode};
use super::text::{
    sanitize_text_for_tui, tail_window, truncate_with_ellipsis, visible_window, wrap_text_lines,
};
use super::theme::Theme;

const NAME_WIDTH: usize = 24;

pub(crate) fn draw_ui(frame: &mut ratatui::Frame, app: &mut AppState) {
    let theme = Theme::dark();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(3),
        ])
        .split(frame.area());

    draw_header(frame, app, &theme, chunks[0]);
    if app.view_mode == ViewMode::Tail {
        if let Some(tail) = app.tail.as_ref() {
            draw_tail(frame, tail, &theme, chunks[1]);
        }
    } else {
        let body = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(chunks[1]);
        draw_jobs(frame, app, &theme, body[0]);
        draw_console(frame, app, &theme, body[1]);
    }
    draw_footer(frame, app, &theme, chunks[2]);

    if let Some(pending) = app.confirm.as_ref() {
        let lines = vec![
            Line::styled(pending.question.clone(), theme.warn_style()),
            Line::raw(""),
            Line::styled("y / Enter: confirm    any other key: cancel", theme.help_style()),
        ];
        draw_popup(frame, &theme, "Confirm", lines, false);
    }
    if let Some(message) = app.alert.as_ref() {
        let mut lines: Vec<Line> = sanitize_text_for_tui(message)
            .lines()
            .map(|line| Line::styled(line.to_string(), theme.text_style()))
            .collect();
        lines.push(Line::raw(""));
        lines.push(Line::styled("Enter / Esc: dismiss", theme.help_style()));
        draw_popup(frame, &theme, "Error", lines, true);
    }
}

fn draw_header(frame: &mut ratatui::Frame, app: &AppState, theme: &Theme, area: Rect) {
    let user = app.user_filter.as_deref().unwrap_or("all users");
    let refresh = if app.auto_refresh {
        format!("on ({}s)", app.refresh_interval.as_secs())
    } else {
        "off".to_string()
    };
    let mut spans = vec![
        Span::styled("User: ", theme.key_style()),
        Span::styled(user.to_string(), theme.accent_style()),
        Span::styled("  Jobs: ", theme.key_style()),
        Span::styled(app.jobs.len().to_string(), theme.accent_style()),
        Span::styled("  Auto-refresh: ", theme.key_style()),
        Span::styled(refresh, theme.accent_style()),
        Span::styled("  ", theme.key_style()),
    ];
    match (&app.running, &app.notice) {
        (Some(label), _) => spans.push(Span::styled(format!("{label}..."), theme.warn_style())),
        (None, Some(notice)) => spans.push(Span::styled(notice.clone(), theme.warn_style())),
        (None, None) => spans.push(Span::styled("Ready", theme.dim_style())),
    }
    let header = Paragraph::new(Line::from(spans)).block(theme.block("vibeslurm"));
    frame.render_widget(header, area);
}

fn draw_jobs(frame: &mut ratatui::Frame, app: &mut AppState, theme: &Theme, area: Rect) {
    let header = Row::new(
        ["JOBID", "PARTITION", "NAME", "USER", "ST", "TIME", "NODES", "NODELIST"]
            .into_iter()
            .map(Cell::from),
    )
    .style(theme.header_style());
    let rows = app.jobs.iter().map(|job| {
        Row::new(vec![
            Cell::from(job.job_id.clone()),
            Cell::from(job.partition.clone()),
            Cell::from(truncate_with_ellipsis(&job.name, NAME_WIDTH)),
            Cell::from(job.user.clone()),
            Cell::from(job.state.clone()),
            Cell::from(job.time.clone()),
            Cell::from(job.nodes.clone()),
            Cell::from(job.nodelist.clone()),
        ])
        .style(theme.state_style(job.state_class()))
    });
    let widths = [
        Constraint::Length(10),
        Constraint::Length(10),
        Constraint::Length(NAME_WIDTH as u16),
        Constraint::Length(10),
        Constraint::Length(3),
        Constraint::Length(11),
        Constraint::Length(6),
        Constraint::Min(10),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .block(theme.block("Queue"))
        .row_highlight_style(theme.highlight_style())
        .highlight_symbol(">> ");
    frame.render_stateful_widget(table, area, &mut app.table_state);
}

fn draw_console(frame: &mut ratatui::Frame, app: &AppState, theme: &Theme, area: Rect) {
    let title = if app.console_scroll > 0 {
        "Console (scrolled, End to follow)"
    } else {
        "Console"
    };
    let block = theme.block(title);
    let inner = block.inner(area);
    let width = inner.width.max(1) as usize;
    let rule = "-".repeat(width);

    let mut wrapped = Vec::new();
    for line in &app.console {
        if line.level == ConsoleLevel::Rule {
            wrapped.push((line.level, rule.clone()));
            continue;
        }
        for part in wrap_text_lines(&line.text, width) {
            wrapped.push((line.level, part));
        }
    }
    let lines: Vec<Line> = visible_window(&wrapped, inner.height as usize, app.console_scroll)
        .iter()
        .map(|(level, text)| Line::styled(text.clone(), theme.console_style(*level)))
        .collect();
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_tail(frame: &mut ratatui::Frame, tail: &TailView, theme: &Theme, area: Rect) {
    let panes = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);
    for (stream, pane) in [
        (OutputStream::Stdout, panes[0]),
        (OutputStream::Stderr, panes[1]),
    ] {
        draw_tail_stream(frame, tail, stream, theme, pane);
    }
}

fn draw_tail_stream(
    frame: &mut ratatui::Frame,
    tail: &TailView,
    stream: OutputStream,
    theme: &Theme,
    area: Rect,
) {
    let focused = tail.focus == stream;
    let path = tail
        .session
        .path(stream)
        .map(|path| path.display().to_string());
    let title = format!(
        "{}{} of job {}{}",
        if focused { "* " } else { "" },
        stream,
        tail.session.job_id(),
        path.as_deref()
            .map(|path| format!(" ({path})"))
            .unwrap_or_default(),
    );
    let block = theme.block(&title);
    let inner = block.inner(area);

    let buffer = tail.buffer(stream);
    let body: Vec<Line> = match (&path, &buffer.error) {
        (None, _) => vec![Line::styled(
            format!("no {stream} file configured"),
            theme.dim_style(),
        )],
        (Some(_), Some(message)) => vec![Line::styled(
            format!("cannot read {stream}: {message}"),
            theme.console_style(ConsoleLevel::Error),
        )],
        (Some(_), None) if buffer.waiting => vec![Line::styled(
            "waiting for the job to create this file...",
            theme.dim_style(),
        )],
        (Some(_), None) => {
            let scroll = if focused { tail.scroll } else { 0 };
            tail_window(
                buffer.lines(),
                inner.width as usize,
                inner.height as usize,
                scroll,
            )
            .into_iter()
            .map(|line| Line::styled(line, theme.text_style()))
            .collect()
        }
    };
    let body = Paragraph::new(body).block(block).wrap(Wrap { trim: false });
    frame.render_widget(body, area);
}

fn draw_footer(frame: &mut ratatui::Frame, app: &AppState, theme: &Theme, area: Rect) {
    let line = if let Some(prompt) = app.prompt.as_ref() {
        Line::from(vec![
            Span::styled(format!("{}: ", prompt.kind.title()), theme.key_style()),
            Span::styled(format!("{}_", prompt.input), theme.accent_style()),
            Span::styled("   Enter: ok  Esc: cancel", theme.help_style()),
        ])
    } else if app.confirm_quit {
        Line::styled("Press q again to quit, any other key to stay", theme.warn_style())
    } else if app.view_mode == ViewMode::Tail {
        Line::styled(
            "Esc/t close  Tab switch stream  j/k scroll  PgUp/PgDn page  End follow  q quit",
            theme.help_style(),
        )
    } else {
        Line::styled(
            "r refresh  u user  c cancel  C cancel all  s submit  i info  o/e output  t tail  p sinfo  a auto  q quit",
            theme.help_style(),
        )
    };
    frame.render_widget(Paragraph::new(line).block(theme.block("Keys")), area);
}

fn draw_popup(
    frame: &mut ratatui::Frame,
    theme: &Theme,
    title: &str,
    lines: Vec<Line>,
    alert: bool,
) {
    let height = (lines.len() as u16).saturating_add(2).min(frame.area().height);
    let area = centered(frame.area(), 60, height);
    frame.render_widget(Clear, area);
    let popup = Paragraph::new(lines)
        .block(theme.popup_block(title, alert))
        .wrap(Wrap { trim: false });
    frame.render_widget(popup, area);
}

fn centered(area: Rect, percent_x: u16, height: u16) -> Rect {
    let [row] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    let [cell] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .areas(row);
    cell
}
