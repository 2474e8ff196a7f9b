//! Execution controller.
//!
//! `trigger` claims the single-flight slot and spawns one task per request.
//! The task resolves the block, runs it on the kernel and reports every step
//! as a [`ControllerEvent`]. Markers, the cursor and the console belong to
//! whoever drains the event receiver; the task never touches them directly.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::block::{CodeBlock, LineRange};
use crate::editor::{BufferId, Document, LineSelection, MarkerState, Snapshot};
use crate::error::{Result, WorkerError};
use crate::execution::{ExecutionResult, IncrementalCompiler, Kernel};

pub mod probe;
pub mod state;

pub use probe::Probe;
pub use state::{ExecState, StateCell};

/// How the block is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// The statement around the cursor or selection. A cursor on a `#%%` line
    /// runs that cell.
    #[default]
    Block,
    /// The whole `#%%` cell containing the cursor.
    Cell,
}

/// Everything a background task needs to run one block.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub buffer: BufferId,
    /// Name used in tracebacks.
    pub filename: String,
    /// Directory the interpreter switches to before the first run in this buffer.
    pub working_dir: Option<PathBuf>,
    pub snapshot: Snapshot,
    pub selection: LineSelection,
    pub mode: RunMode,
    /// Move the cursor past the block once it resolves.
    pub advance_cursor: bool,
    /// Drop the request unless the resolved block contains the cursor line.
    pub require_cursor_inside: bool,
}

impl ExecRequest {
    pub fn from_document(document: &Document, mode: RunMode) -> Self {
        Self {
            buffer: document.id,
            filename: document.source_name(),
            working_dir: document.working_dir(),
            snapshot: document.snapshot(),
            selection: document.line_selection(),
            mode,
            advance_cursor: true,
            require_cursor_inside: false,
        }
    }

    pub fn with_advance(mut self, advance_cursor: bool) -> Self {
        self.advance_cursor = advance_cursor;
        self
    }

    /// Run the block under `line`, but only if `line` is part of it.
    pub fn clicked_at(mut self, line: usize) -> Self {
        self.selection = LineSelection::cursor(line);
        self.require_cursor_inside = true;
        self.advance_cursor = false;
        self
    }
}

/// Progress of a request, delivered in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    State(ExecState),
    Markers {
        buffer: BufferId,
        lines: LineRange,
        state: MarkerState,
    },
    ClearMarkers {
        buffer: BufferId,
    },
    MoveCursor {
        buffer: BufferId,
        line: usize,
    },
    Finished {
        buffer: BufferId,
        lines: LineRange,
        result: ExecutionResult,
    },
    /// The kernel failed to answer; nothing was marked finished.
    Aborted {
        buffer: BufferId,
        reason: String,
    },
}

/// Long-lived service that turns requests into kernel calls.
pub struct ExecutionController<K> {
    kernel: Arc<K>,
    state: StateCell,
    events: mpsc::UnboundedSender<ControllerEvent>,
    last_buffer: Arc<Mutex<Option<BufferId>>>,
}

impl<K: Kernel> ExecutionController<K> {
    pub fn new(kernel: Arc<K>) -> (Self, mpsc::UnboundedReceiver<ControllerEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let controller = Self {
            kernel,
            state: StateCell::new(),
            events,
            last_buffer: Arc::new(Mutex::new(None)),
        };
        (controller, receiver)
    }

    pub fn kernel(&self) -> &Arc<K> {
        &self.kernel
    }

    pub fn state(&self) -> ExecState {
        self.state.get()
    }

    /// Start handling `request` in the background. Returns false, and does
    /// nothing, while another request is in flight.
    pub fn trigger(&self, request: ExecRequest) -> bool {
        if !self.state.try_begin() {
            debug!(buffer = %request.buffer, "execution in flight, trigger dropped");
            return false;
        }
        let _ = self.events.send(ControllerEvent::State(ExecState::Probing));
        let job = Job {
            kernel: self.kernel.clone(),
            state: self.state.clone(),
            events: self.events.clone(),
            last_buffer: self.last_buffer.clone(),
            request,
        };
        tokio::spawn(job.run());
        true
    }

    /// Make the next run re-send its working directory (after a restart).
    pub fn forget_working_dir(&self) {
        *lock(&self.last_buffer) = None;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, Copy)]
enum Dispatch {
    Evaluate,
    Execute,
    Source,
}

struct Job<K> {
    kernel: Arc<K>,
    state: StateCell,
    events: mpsc::UnboundedSender<ControllerEvent>,
    last_buffer: Arc<Mutex<Option<BufferId>>>,
    request: ExecRequest,
}

impl<K: Kernel> Job<K> {
    async fn run(self) {
        if let Err(err) = self.execute().await {
            warn!(%err, buffer = %self.request.buffer, "execution aborted");
            self.emit(ControllerEvent::Aborted {
                buffer: self.request.buffer,
                reason: err.to_string(),
            });
        }
        self.set(ExecState::Idle);
    }

    fn emit(&self, event: ControllerEvent) {
        let _ = self.events.send(event);
    }

    fn set(&self, next: ExecState) {
        self.state.advance(next);
        self.emit(ControllerEvent::State(next));
    }

    fn paint(&self, lines: LineRange, state: MarkerState) {
        self.emit(ControllerEvent::Markers {
            buffer: self.request.buffer,
            lines,
            state,
        });
    }

    async fn execute(&self) -> Result<()> {
        let request = &self.request;
        let compiler = IncrementalCompiler::new(self.kernel.clone(), request.filename.clone());
        let resolved = probe::probe(
            &compiler,
            &request.snapshot,
            request.selection,
            request.mode,
            request.require_cursor_inside,
        )
        .await?;

        match resolved {
            Probe::Empty | Probe::OutsideBlock => {
                debug!(?resolved, "nothing to run");
                self.emit(ControllerEvent::ClearMarkers { buffer: request.buffer });
                Ok(())
            }
            Probe::Invalid { block, report } => {
                self.reject(&block, ExecutionResult::SyntaxError(report));
                Ok(())
            }
            Probe::Incomplete { block } => {
                self.reject(&block, ExecutionResult::Incomplete);
                Ok(())
            }
            Probe::Exhausted { block } => {
                info!(lines = %block.lines(), "no complete statement found, running the remainder as is");
                self.run_block(&block, Dispatch::Source).await
            }
            Probe::Ready { block, expression } => {
                let dispatch = if expression { Dispatch::Evaluate } else { Dispatch::Execute };
                self.run_block(&block, dispatch).await
            }
        }
    }

    /// The block does not compile: report it without running anything.
    fn reject(&self, block: &CodeBlock, result: ExecutionResult) {
        let lines = block.code_lines();
        self.set(ExecState::Failed);
        self.paint(lines, MarkerState::Error);
        if self.request.advance_cursor {
            self.emit(ControllerEvent::MoveCursor {
                buffer: self.request.buffer,
                line: block.start_line,
            });
        }
        self.emit(ControllerEvent::Finished {
            buffer: self.request.buffer,
            lines,
            result,
        });
    }

    async fn run_block(&self, block: &CodeBlock, dispatch: Dispatch) -> Result<()> {
        let request = &self.request;
        let lines = block.code_lines();
        self.set(ExecState::Resolved);
        self.paint(lines, MarkerState::Active);
        if request.advance_cursor {
            self.emit(ControllerEvent::MoveCursor {
                buffer: request.buffer,
                line: request.selection.cursor_line.max(block.end_line + 1),
            });
        }

        self.set(ExecState::Running);
        let outcome = match self.enter_buffer().await {
            Ok(()) => match dispatch {
                Dispatch::Evaluate => self.kernel.evaluate().await,
                Dispatch::Execute => self.kernel.execute().await,
                Dispatch::Source => {
                    self.kernel
                        .execute_source(block.start_line, &request.filename, &block.text)
                        .await
                }
            },
            Err(err) => Err(err),
        };
        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                self.paint(lines, MarkerState::Error);
                return Err(err);
            }
        };

        let (state, marker) = if result.is_error() {
            (ExecState::Error, MarkerState::Error)
        } else {
            (ExecState::Success, MarkerState::Finished)
        };
        self.set(state);
        self.paint(lines, marker);
        self.emit(ControllerEvent::Finished {
            buffer: request.buffer,
            lines,
            result,
        });
        Ok(())
    }

    /// Switch the interpreter to the buffer's directory on the first run
    /// after changing buffers.
    async fn enter_buffer(&self) -> Result<()> {
        let buffer = self.request.buffer;
        if *lock(&self.last_buffer) == Some(buffer) {
            return Ok(());
        }
        if let Some(dir) = &self.request.working_dir {
            match self.kernel.set_working_dir(dir).await {
                Ok(()) => debug!(dir = %dir.display(), "changed worker directory"),
                Err(err) if err.is_liveness_failure() => return Err(err),
                Err(WorkerError::Timeout(limit)) => {
                    warn!(?limit, "working directory change timed out");
                }
                Err(err) => warn!(%err, dir = %dir.display(), "could not change worker directory"),
            }
        }
        *lock(&self.last_buffer) = Some(buffer);
        Ok(())
    }
}
