use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::app::{AppState, JobAction, PromptKind, ViewMode};

const CONSOLE_PAGE: usize = 10;
const TAIL_PAGE: usize = 20;

/// Applies one key press. Returns `true` when the app should exit.
pub(crate) fn handle_key_event(key: KeyEvent, app: &mut AppState) -> bool {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if app.alert.is_some() {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
            app.alert = None;
        }
        return false;
    }

    if app.confirm.is_some() {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => app.answer_confirm(true),
            _ => app.answer_confirm(false),
        }
        return false;
    }

    if let Some(prompt) = app.prompt.as_mut() {
        match key.code {
            KeyCode::Enter => app.submit_prompt(),
            KeyCode::Esc => app.prompt = None,
            KeyCode::Backspace => {
                prompt.input.pop();
            }
            KeyCode::Char(ch) => prompt.input.push(ch),
            _ => {}
        }
        return false;
    }

    if app.confirm_quit {
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => return true,
            _ => {
                app.confirm_quit = false;
                return false;
            }
        }
    }

    if app.view_mode == ViewMode::Tail {
        handle_tail_key(key, app);
        return false;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => app.confirm_quit = true,
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        KeyCode::Char('r') | KeyCode::Char('R') => app.request_refresh(),
        KeyCode::Char('u') | KeyCode::Char('U') => {
            let current = app.user_filter.clone().unwrap_or_default();
            app.open_prompt(PromptKind::UserFilter, &current);
        }
        KeyCode::Char('c') => app.act_on_selected(JobAction::Cancel),
        KeyCode::Char('C') => {
            let current = app.user_filter.clone().unwrap_or_default();
            app.open_prompt(PromptKind::CancelAllUser, &current);
        }
        KeyCode::Char('i') | KeyCode::Char('I') => app.act_on_selected(JobAction::Info),
        KeyCode::Char('o') => app.act_on_selected(JobAction::ReadStdout),
        KeyCode::Char('e') => app.act_on_selected(JobAction::ReadStderr),
        KeyCode::Char('t') | KeyCode::Char('T') => app.act_on_selected(JobAction::Tail),
        KeyCode::Char('s') | KeyCode::Char('S') => app.open_prompt(PromptKind::ScriptPath, ""),
        KeyCode::Char('p') | KeyCode::Char('P') => app.open_prompt(PromptKind::Partition, ""),
        KeyCode::Char('a') | KeyCode::Char('A') => app.toggle_auto_refresh(),
        KeyCode::PageUp => app.scroll_console(true, CONSOLE_PAGE),
        KeyCode::PageDown => app.scroll_console(false, CONSOLE_PAGE),
        KeyCode::End => app.console_scroll = 0,
        _ => {}
    }
    false
}

fn handle_tail_key(key: KeyEvent, app: &mut AppState) {
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => app.confirm_quit = true,
        KeyCode::Esc | KeyCode::Char('t') | KeyCode::Char('T') => app.close_tail(),
        KeyCode::Tab => app.switch_tail_focus(),
        KeyCode::Up | KeyCode::Char('k') => app.scroll_tail(true, 1),
        KeyCode::Down | KeyCode::Char('j') => app.scroll_tail(false, 1),
        KeyCode::PageUp => app.scroll_tail(true, TAIL_PAGE),
        KeyCode::PageDown => app.scroll_tail(false, TAIL_PAGE),
        KeyCode::End | KeyCode::Char('G') => {
            if let Some(tail) = app.tail.as_mut() {
                tail.scroll = 0;
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slurm_core::{CommandRequest, Config};

    fn press(app: &mut AppState, code: KeyCode) -> bool {
        handle_key_event(KeyEvent::new(code, KeyModifiers::NONE), app)
    }

    fn type_text(app: &mut AppState, text: &str) {
        for ch in text.chars() {
            press(app, KeyCode::Char(ch));
        }
    }

    #[test]
    fn quit_needs_confirmation() {
        let mut app = AppState::new(&Config::default());
        assert!(!press(&mut app, KeyCode::Char('q')));
        assert!(app.confirm_quit);
        assert!(!press(&mut app, KeyCode::Esc));
        assert!(!app.confirm_quit);
        press(&mut app, KeyCode::Char('q'));
        assert!(press(&mut app, KeyCode::Char('q')));
    }

    #[test]
    fn submit_prompt_queues_script() {
        let mut app = AppState::new(&Config::default());
        press(&mut app, KeyCode::Char('s'));
        type_text(&mut app, "jobs/trainx");
        press(&mut app, KeyCode::Backspace);
        press(&mut app, KeyCode::Enter);
        let submissions = app.take_submissions();
        assert_eq!(
            submissions[0].request,
            CommandRequest::SubmitScript {
                path: "jobs/train".to_string()
            }
        );
    }

    #[test]
    fn cancel_without_selection_asks_for_job_id_then_confirms() {
        let mut app = AppState::new(&Config::default());
        press(&mut app, KeyCode::Char('c'));
        type_text(&mut app, "88");
        press(&mut app, KeyCode::Enter);
        assert!(app.take_submissions().is_empty());
        press(&mut app, KeyCode::Char('n'));
        assert!(app.take_submissions().is_empty());
        assert!(app.confirm.is_none());

        press(&mut app, KeyCode::Char('c'));
        type_text(&mut app, "88");
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char('y'));
        assert_eq!(
            app.take_submissions()[0].request,
            CommandRequest::CancelJob {
                job_id: "88".to_string()
            }
        );
    }

    #[test]
    fn alert_swallows_keys_until_dismissed() {
        let mut app = AppState::new(&Config::default());
        app.alert = Some("boom".to_string());
        press(&mut app, KeyCode::Char('r'));
        assert!(app.take_submissions().is_empty());
        press(&mut app, KeyCode::Enter);
        assert!(app.alert.is_none());
        press(&mut app, KeyCode::Char('r'));
        assert_eq!(app.take_submissions().len(), 1);
    }
}
