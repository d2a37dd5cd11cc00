mod app;
mod input;
mod render;
mod terminal;
mod text;
mod theme;

use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyEventKind};
use slurm_core::{Config, Dispatcher, SlurmCommands};
use tokio::runtime::Handle;

use app::AppState;
use input::handle_key_event;
use render::draw_ui;
use terminal::{restore_terminal, setup_terminal, Tui};

const TICK_RATE: Duration = Duration::from_millis(100);

pub(crate) async fn run(config: Config, commands: SlurmCommands) -> anyhow::Result<()> {
    let (dispatcher, completions) = Dispatcher::new(commands, Handle::current());
    let mut app = AppState::new(&config);
    app.request_refresh();

    let mut terminal = setup_terminal()?;
    let result = event_loop(&mut terminal, &mut app, &dispatcher, completions, &config);
    restore_terminal(&mut terminal)?;
    if dispatcher.is_busy() {
        tracing::info!("waiting for in-flight command before exit");
        dispatcher.wait_idle().await;
    }
    result
}

fn event_loop(
    terminal: &mut Tui,
    app: &mut AppState,
    dispatcher: &Dispatcher,
    mut completions: tokio::sync::mpsc::Receiver<slurm_core::Completion>,
    config: &Config,
) -> anyhow::Result<()> {
    let tail_interval = config.tail.poll_interval();
    let mut last_tail_poll = Instant::now();
    loop {
        while let Ok(completion) = completions.try_recv() {
            app.handle_completion(completion);
        }

        let now = Instant::now();
        if app.refresh_due(now) {
            if dispatcher.is_busy() {
                tracing::debug!("auto-refresh skipped, dispatcher busy");
                app.mark_refreshed(now);
            } else {
                app.request_refresh();
            }
        }
        if app.tail.is_some() && now.duration_since(last_tail_poll) >= tail_interval {
            app.poll_tail();
            last_tail_poll = now;
        }

        for submission in app.take_submissions() {
            let outcome = dispatcher.submit(submission.request.clone());
            app.record_submit(submission, outcome);
        }
        app.running = dispatcher.running();

        terminal.draw(|frame| draw_ui(frame, app))?;

        if event::poll(TICK_RATE)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && handle_key_event(key, app) {
                    break;
                }
            }
        }
    }
    Ok(())
}
