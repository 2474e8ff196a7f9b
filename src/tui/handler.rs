//! Async event handler for the editor TUI.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{
    self, DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture, Event, KeyCode,
    KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use is_terminal::IsTerminal;
use ratatui::prelude::*;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{
    app::App,
    events::PadEvent,
    ui::{gutter_width, render_ui},
};
use crate::{
    config::Config,
    controller::{ExecRequest, ExecutionController, RunMode},
    editor::Document,
    execution::WorkerChannel,
    snippets::SnippetLog,
};

type Controller = ExecutionController<WorkerChannel>;

/// Options the editor session starts with.
#[derive(Debug, Clone)]
pub struct PadOptions {
    pub advance_cursor: bool,
    pub cell_highlight: bool,
    pub flush_interval: Duration,
    pub max_console_lines: usize,
    pub snippet_log: SnippetLog,
}

impl PadOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            advance_cursor: cfg.advance_cursor(),
            cell_highlight: cfg.cell_highlight(),
            flush_interval: cfg.flush_interval(),
            max_console_lines: cfg.max_console_lines(),
            snippet_log: SnippetLog::new(cfg.snippet_log_path()),
        }
    }
}

/// Run the editor until the user quits.
pub async fn run_pad(docs: Vec<Document>, channel: WorkerChannel, options: PadOptions) -> Result<()> {
    // Check if we're in a proper terminal environment
    if !io::stdout().is_terminal() {
        return Err(anyhow::anyhow!("the editor requires a terminal"));
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    stdout.execute(EnableMouseCapture)?;
    stdout.execute(EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(docs, options.max_console_lines);
    app.advance_cursor = options.advance_cursor;
    app.cell_highlight = options.cell_highlight;

    let result = run_app(&mut terminal, &mut app, channel.clone(), &options).await;

    // Restore terminal
    disable_raw_mode()?;
    terminal.backend_mut().execute(DisableBracketedPaste)?;
    terminal.backend_mut().execute(DisableMouseCapture)?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    channel.shutdown().await;
    result
}

/// Main application loop
async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    channel: WorkerChannel,
    options: &PadOptions,
) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<PadEvent>();
    let (controller, mut controller_rx) = ExecutionController::new(Arc::new(channel.clone()));

    // Spawn input handler
    let input_tx = event_tx.clone();
    tokio::task::spawn_blocking(move || {
        while !input_tx.is_closed() {
            if !event::poll(Duration::from_millis(100)).unwrap_or(false) {
                continue;
            }
            let forwarded = match event::read() {
                Ok(Event::Key(key)) if key.kind != KeyEventKind::Release => PadEvent::Key(key),
                Ok(Event::Mouse(mouse)) => PadEvent::Mouse(mouse),
                Ok(Event::Paste(text)) => PadEvent::Paste(text),
                _ => continue,
            };
            if input_tx.send(forwarded).is_err() {
                break; // Channel closed
            }
        }
    });

    let controller_tx = event_tx.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(event) = controller_rx.recv().await {
            if controller_tx.send(PadEvent::Controller(event)).is_err() {
                break;
            }
        }
    });

    let flush_tx = event_tx.clone();
    let flush_channel = channel.clone();
    let flush_interval = options.flush_interval;
    let flusher = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(flush_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if !flush_channel.is_alive() {
                continue;
            }
            match flush_channel.flush().await {
                Ok(chunks) if chunks.is_empty() => {}
                Ok(chunks) => {
                    if flush_tx.send(PadEvent::Output(chunks)).is_err() {
                        break;
                    }
                }
                Err(err) => debug!(%err, "output flush failed"),
            }
        }
    });

    let outcome: Result<()> = loop {
        // Render UI
        if let Err(err) = terminal.draw(|frame| render_ui(frame, app)) {
            break Err(err.into());
        }

        // Handle events
        let mut quit = false;
        while let Ok(pad_event) = event_rx.try_recv() {
            match pad_event {
                PadEvent::Key(key) => {
                    if handle_key_event(app, key, &controller, options, &event_tx) {
                        quit = true;
                        break;
                    }
                }
                PadEvent::Mouse(mouse) => handle_mouse_event(app, mouse, &controller),
                PadEvent::Paste(text) => {
                    let edit = app.doc_mut().insert_str(&text);
                    app.edited(edit);
                }
                PadEvent::Controller(event) => app.apply_controller_event(event),
                PadEvent::Output(chunks) => app.append_output(&chunks),
                PadEvent::KernelRestarted(result) => {
                    controller.forget_working_dir();
                    app.restarted(result);
                }
            }
        }
        if quit {
            break Ok(());
        }

        // Small delay to prevent busy waiting
        tokio::time::sleep(Duration::from_millis(16)).await; // ~60 FPS
    };

    flusher.abort();
    forwarder.abort();
    outcome
}

/// Start running the block at the cursor of the active buffer.
fn trigger(app: &mut App, controller: &Controller, request: ExecRequest) {
    if !app.doc().is_python() {
        app.status_message = format!("{} is not a Python buffer", app.doc().name());
        return;
    }
    if !controller.trigger(request) {
        app.status_message = format!("busy ({})", controller.state());
    }
}

fn run(app: &mut App, controller: &Controller, mode: RunMode, advance: bool) {
    let request = ExecRequest::from_document(app.doc(), mode).with_advance(advance);
    trigger(app, controller, request);
}

/// Handle keyboard events. Returns true when the user asked to quit.
fn handle_key_event(
    app: &mut App,
    key: KeyEvent,
    controller: &Controller,
    options: &PadOptions,
    event_tx: &mpsc::UnboundedSender<PadEvent>,
) -> bool {
    // If help is shown, any key closes it
    if app.show_help {
        app.toggle_help();
        return false;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);
    let advance = app.advance_cursor;
    match key.code {
        KeyCode::Char('q') if ctrl => return true,
        KeyCode::Char('c') if ctrl => return app.handle_ctrl_c(),
        KeyCode::F(1) => app.toggle_help(),
        KeyCode::F(5) => run(app, controller, RunMode::Block, advance),
        KeyCode::F(6) => run(app, controller, RunMode::Block, false),
        KeyCode::F(8) => run(app, controller, RunMode::Cell, advance),
        KeyCode::Char('r') if ctrl => restart(app, controller, event_tx),
        KeyCode::Char('l') if ctrl => {
            app.console.clear();
            app.scroll_console_to_bottom();
        }
        KeyCode::Char('u') if ctrl => {
            if !app.console.undo_last_batch() {
                app.status_message = "nothing to undo".to_string();
            }
        }
        KeyCode::Char('s') if ctrl => {
            app.status_message = match app.doc_mut().save() {
                Ok(()) => format!("saved {}", app.doc().name()),
                Err(err) => format!("{err:#}"),
            };
        }
        KeyCode::Char('k') if ctrl => log_snippet(app, &options.snippet_log),
        KeyCode::Char('n') if ctrl => app.next_buffer(),
        KeyCode::PageUp => app.scroll_console_up(5),
        KeyCode::PageDown => app.scroll_console_down(5),
        KeyCode::Left => app.doc_mut().move_left(shift),
        KeyCode::Right => app.doc_mut().move_right(shift),
        KeyCode::Up => app.doc_mut().move_up(1, shift),
        KeyCode::Down => app.doc_mut().move_down(1, shift),
        KeyCode::Home => app.doc_mut().move_home(shift),
        KeyCode::End => app.doc_mut().move_end(shift),
        KeyCode::Enter => {
            let edit = app.doc_mut().insert_newline();
            app.edited(edit);
        }
        KeyCode::Tab => {
            let edit = app.doc_mut().insert_tab();
            app.edited(edit);
        }
        KeyCode::Backspace => {
            if let Some(edit) = app.doc_mut().backspace() {
                app.edited(edit);
            }
        }
        KeyCode::Delete => {
            if let Some(edit) = app.doc_mut().delete() {
                app.edited(edit);
            }
        }
        KeyCode::Char(c) if !ctrl => {
            let edit = app.doc_mut().insert_char(c);
            app.edited(edit);
        }
        _ => {}
    }
    false
}

fn handle_mouse_event(app: &mut App, mouse: MouseEvent, controller: &Controller) {
    match mouse.kind {
        MouseEventKind::ScrollUp => app.scroll_console_up(1),
        MouseEventKind::ScrollDown => app.scroll_console_down(1),
        MouseEventKind::Down(MouseButton::Left) => {
            if let Some(line) = app.line_at_row(mouse.row) {
                let text_x = app.editor_area.x + 1 + gutter_width(app.doc());
                let column = usize::from(mouse.column.saturating_sub(text_x));
                app.doc_mut().set_cursor(line, column);
            }
        }
        MouseEventKind::Down(MouseButton::Middle) => {
            if let Some(line) = app.line_at_row(mouse.row) {
                let request = ExecRequest::from_document(app.doc(), RunMode::Block).clicked_at(line);
                trigger(app, controller, request);
            }
        }
        _ => {}
    }
}

fn restart(app: &mut App, controller: &Controller, event_tx: &mpsc::UnboundedSender<PadEvent>) {
    app.restarting();
    let kernel = controller.kernel().clone();
    let tx = event_tx.clone();
    tokio::spawn(async move {
        let result = kernel.restart().await.map_err(|err| {
            warn!(%err, "restart failed");
            err.to_string()
        });
        let _ = tx.send(PadEvent::KernelRestarted(result));
    });
}

/// Log the selection, or open the log when nothing is selected.
fn log_snippet(app: &mut App, log: &SnippetLog) {
    match app.doc().selected_text() {
        Some(text) => {
            app.status_message = match log.append(&text) {
                Ok(()) => format!("snippet saved to {}", log.path().display()),
                Err(err) => format!("{err:#}"),
            };
        }
        None => {
            let id = app.next_buffer_id();
            match Document::open(id, log.path()) {
                Ok(doc) => app.open(doc),
                Err(err) => app.status_message = format!("{err:#}"),
            }
        }
    }
}
