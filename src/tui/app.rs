//! TUI application state management.

use std::time::{Duration, Instant};

use ratatui::layout::Rect;
use tracing::debug;

use crate::controller::{ControllerEvent, ExecState};
use crate::editor::{BufferId, Console, ConsoleView, Document, EditEvent, MarkerBook, MarkerState, TextBuffer};
use crate::execution::OutputChunk;

/// Application state for the TUI
#[derive(Debug)]
pub struct App {
    /// Open buffers
    pub docs: Vec<Document>,
    /// Index of the buffer shown in the editor pane
    pub active: usize,
    pub console: ConsoleView,
    pub markers: MarkerBook,
    pub exec_state: ExecState,
    /// Whether the Python worker answered the last time we asked
    pub kernel_alive: bool,
    /// Status message to display
    pub status_message: String,
    /// Whether to show help
    pub show_help: bool,
    /// First buffer line shown in the editor pane
    pub editor_top: usize,
    /// Editor pane as last drawn, for mouse hit-testing
    pub editor_area: Rect,
    /// Lines scrolled up from the bottom of the console
    pub console_scroll_offset: usize,
    pub advance_cursor: bool,
    pub cell_highlight: bool,
    /// Timestamp of last Ctrl+C press for double Ctrl+C detection
    pub last_ctrl_c_time: Option<Instant>,
    /// A run was in flight when a restart was requested; its abort is expected.
    interrupted_by_restart: bool,
    next_id: u32,
}

impl App {
    pub fn new(docs: Vec<Document>, max_console_lines: usize) -> Self {
        let next_id = docs.iter().map(|doc| doc.id.0 + 1).max().unwrap_or(1);
        let mut app = Self {
            docs,
            active: 0,
            console: ConsoleView::new(max_console_lines),
            markers: MarkerBook::new(),
            exec_state: ExecState::Idle,
            kernel_alive: true,
            status_message: String::new(),
            show_help: false,
            editor_top: 0,
            editor_area: Rect::default(),
            console_scroll_offset: 0,
            advance_cursor: true,
            cell_highlight: true,
            last_ctrl_c_time: None,
            interrupted_by_restart: false,
            next_id,
        };
        if app.docs.is_empty() {
            app.open_untitled();
        }
        app.status_message = "F5 run | F8 run cell | F1 help".to_string();
        app
    }

    pub fn doc(&self) -> &Document {
        &self.docs[self.active]
    }

    pub fn doc_mut(&mut self) -> &mut Document {
        &mut self.docs[self.active]
    }

    pub fn is_running(&self) -> bool {
        !self.exec_state.is_idle()
    }

    /// Allocate an id for a buffer about to be opened.
    pub fn next_buffer_id(&mut self) -> BufferId {
        let id = BufferId(self.next_id);
        self.next_id += 1;
        id
    }

    fn open_untitled(&mut self) {
        let id = self.next_buffer_id();
        self.docs.push(Document::new(id));
        self.active = self.docs.len() - 1;
    }

    /// Show `doc`, or switch to it if the same file is already open.
    pub fn open(&mut self, doc: Document) {
        if let Some(index) = self
            .docs
            .iter()
            .position(|open| open.path.is_some() && open.path == doc.path)
        {
            self.activate(index);
            return;
        }
        self.docs.push(doc);
        self.activate(self.docs.len() - 1);
    }

    pub fn activate(&mut self, index: usize) {
        if index < self.docs.len() && index != self.active {
            self.active = index;
            self.editor_top = 0;
            debug!(buffer = %self.doc().id, "buffer activated");
        }
    }

    pub fn next_buffer(&mut self) {
        self.activate((self.active + 1) % self.docs.len());
    }

    /// Record an edit of the active buffer.
    pub fn edited(&mut self, edit: EditEvent) {
        let id = self.doc().id;
        let running = self.is_running();
        self.markers.on_edit(id, edit, running);
    }

    pub fn apply_controller_event(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::State(state) => {
                self.exec_state = state;
                if state.is_idle() {
                    self.interrupted_by_restart = false;
                }
            }
            ControllerEvent::Markers { buffer, lines, state } => {
                self.markers.paint(buffer, lines, state);
            }
            ControllerEvent::ClearMarkers { buffer } => {
                self.markers.clear(buffer);
            }
            ControllerEvent::MoveCursor { buffer, line } => {
                if let Some(doc) = self.docs.iter_mut().find(|doc| doc.id == buffer) {
                    while doc.line_count() <= line {
                        doc.append_empty_line();
                    }
                    doc.set_cursor(line, 0);
                }
            }
            ControllerEvent::Finished { lines, result, .. } => {
                self.console.write_chunks(&result.console_chunks());
                self.kernel_alive = true;
                self.status_message = format!("{lines}: {}", if result.is_error() { "failed" } else { "done" });
                self.scroll_console_to_bottom();
            }
            ControllerEvent::Aborted { .. } if self.interrupted_by_restart => {
                self.console.write_error("--- run interrupted by restart ---\n");
                self.scroll_console_to_bottom();
            }
            ControllerEvent::Aborted { reason, .. } => {
                self.kernel_alive = false;
                self.console
                    .write_error(&format!("Python is not responding ({reason}). Press Ctrl+R to restart.\n"));
                self.status_message = "Python stopped".to_string();
                self.scroll_console_to_bottom();
            }
        }
    }

    pub fn append_output(&mut self, chunks: &[OutputChunk]) {
        if chunks.is_empty() {
            return;
        }
        self.console.write_chunks(chunks);
        self.scroll_console_to_bottom();
    }

    /// A restart was requested: what the old namespace produced is stale.
    pub fn restarting(&mut self) {
        let id = self.doc().id;
        self.markers.restate(id, MarkerState::Error);
        self.interrupted_by_restart = self.is_running();
        self.status_message = "restarting Python...".to_string();
    }

    pub fn restarted(&mut self, result: Result<(), String>) {
        match result {
            Ok(()) => {
                self.kernel_alive = true;
                self.console.write_error("--- Python restarted, namespace cleared ---\n");
                self.status_message = "Python restarted".to_string();
            }
            Err(err) => {
                self.kernel_alive = false;
                self.console.write_error(&format!("Python could not be restarted: {err}\n"));
                self.status_message = "restart failed".to_string();
            }
        }
        self.scroll_console_to_bottom();
    }

    /// Toggle help display
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Keep the cursor inside a pane of `height` rows.
    pub fn follow_cursor(&mut self, height: usize) {
        let line = self.doc().cursor().line;
        let height = height.max(1);
        if line < self.editor_top {
            self.editor_top = line;
        } else if line >= self.editor_top + height {
            self.editor_top = line + 1 - height;
        }
    }

    /// Buffer line under screen row `row`, if any.
    pub fn line_at_row(&self, row: u16) -> Option<usize> {
        let inner_top = self.editor_area.y + 1;
        let inner_bottom = self.editor_area.y + self.editor_area.height.saturating_sub(1);
        if row < inner_top || row >= inner_bottom {
            return None;
        }
        let line = self.editor_top + usize::from(row - inner_top);
        (line < self.doc().line_count()).then_some(line)
    }

    pub fn scroll_console_up(&mut self, rows: usize) {
        self.console_scroll_offset += rows;
    }

    pub fn scroll_console_down(&mut self, rows: usize) {
        self.console_scroll_offset = self.console_scroll_offset.saturating_sub(rows);
    }

    pub fn scroll_console_to_bottom(&mut self) {
        self.console_scroll_offset = 0;
    }

    /// Handle Ctrl+C press and detect double press for quit
    /// Returns true if should quit (double Ctrl+C), false otherwise
    pub fn handle_ctrl_c(&mut self) -> bool {
        const DOUBLE_CTRL_C_TIMEOUT: Duration = Duration::from_millis(500);

        let now = Instant::now();
        if let Some(last_time) = self.last_ctrl_c_time {
            if now.duration_since(last_time) <= DOUBLE_CTRL_C_TIMEOUT {
                self.last_ctrl_c_time = None;
                return true;
            }
        }

        self.doc_mut().clear_selection();
        self.status_message = "press Ctrl+C again to quit".to_string();
        self.last_ctrl_c_time = Some(now);
        false
    }
}
