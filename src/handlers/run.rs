//! Batch mode: run one block, or every block of a file, without the editor.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use is_terminal::IsTerminal;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::block::LineRange;
use crate::config::Config;
use crate::controller::{ControllerEvent, ExecRequest, ExecState, ExecutionController, RunMode};
use crate::editor::{Console, Document, MarkerState, TextBuffer};
use crate::execution::WorkerChannel;
use crate::printer::ConsolePrinter;

/// What to run, from the command line. Lines are 1-based.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub line: Option<usize>,
    pub end_line: Option<usize>,
    pub cell: bool,
    pub all: bool,
}

/// What one trigger did.
#[derive(Debug, Default)]
struct Step {
    ran: Option<LineRange>,
    failed: bool,
    next_line: Option<usize>,
}

struct BatchRun {
    controller: ExecutionController<WorkerChannel>,
    events: mpsc::UnboundedReceiver<ControllerEvent>,
    printer: ConsolePrinter,
    doc: Document,
    flush_interval: Duration,
}

pub async fn run(cfg: &Config, files: &[PathBuf], options: BatchOptions) -> Result<()> {
    let doc = super::python_document(super::open_documents(files)?)?;
    let spec = super::interpreter(cfg);
    info!(python = %spec.program, file = %doc.source_name(), "batch run");
    let channel = WorkerChannel::spawn(spec, cfg.compile_timeout()).await?;
    let (controller, events) = ExecutionController::new(Arc::new(channel.clone()));

    let mut batch = BatchRun {
        controller,
        events,
        printer: ConsolePrinter::new(io::stdout().is_terminal()),
        doc,
        flush_interval: cfg.flush_interval(),
    };
    let outcome = if options.all {
        batch.run_all().await
    } else {
        batch.run_one(&options).await
    };
    channel.shutdown().await;
    outcome
}

impl BatchRun {
    async fn run_one(&mut self, options: &BatchOptions) -> Result<()> {
        let start = options.line.unwrap_or(1).saturating_sub(1);
        if start >= self.doc.line_count() {
            bail!("{} has only {} lines", self.doc.name(), self.doc.line_count());
        }
        match options.end_line {
            Some(end) => self.doc.select_lines(start, end.saturating_sub(1).max(start)),
            None => self.doc.set_cursor(start, 0),
        }
        let mode = if options.cell { RunMode::Cell } else { RunMode::Block };
        let step = self.step(mode).await?;
        match step.ran {
            Some(lines) if step.failed => bail!("{} failed", lines),
            Some(_) => Ok(()),
            None => {
                self.printer.notice("nothing to run");
                Ok(())
            }
        }
    }

    /// Step through the file from the top, stopping at the first failure.
    async fn run_all(&mut self) -> Result<()> {
        self.doc.set_cursor(0, 0);
        loop {
            let step = self.step(RunMode::Block).await?;
            let Some(lines) = step.ran else {
                debug!("only blank lines and comments remain");
                return Ok(());
            };
            if step.failed {
                bail!("{} failed", lines);
            }
            match step.next_line {
                Some(next) if next < self.doc.line_count() && next > lines.start => self.doc.set_cursor(next, 0),
                _ => return Ok(()),
            }
        }
    }

    /// Trigger one run and print its events until the controller is idle again.
    async fn step(&mut self, mode: RunMode) -> Result<Step> {
        let request = ExecRequest::from_document(&self.doc, mode);
        if !self.controller.trigger(request) {
            bail!("an execution is already running");
        }

        let mut step = Step::default();
        let mut ticker = tokio::time::interval(self.flush_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                event = self.events.recv() => {
                    let event = event.ok_or_else(|| anyhow!("execution controller stopped"))?;
                    if self.apply(event, &mut step)? {
                        break;
                    }
                }
                _ = ticker.tick() => self.flush().await,
            }
        }
        // Leftovers, e.g. stderr written by an evaluated expression.
        self.flush().await;
        Ok(step)
    }

    /// Returns true once the controller is idle.
    fn apply(&mut self, event: ControllerEvent, step: &mut Step) -> Result<bool> {
        match event {
            ControllerEvent::State(ExecState::Idle) => return Ok(true),
            ControllerEvent::State(_) | ControllerEvent::ClearMarkers { .. } => {}
            ControllerEvent::Markers { lines, state, .. } => {
                if state == MarkerState::Active {
                    self.printer.banner(&format!("# {} {}", self.doc.name(), lines));
                }
            }
            ControllerEvent::MoveCursor { line, .. } => step.next_line = Some(line),
            ControllerEvent::Finished { lines, result, .. } => {
                self.printer.write_chunks(&result.console_chunks());
                step.ran = Some(lines);
                step.failed = result.is_error();
            }
            ControllerEvent::Aborted { reason, .. } => {
                bail!("Python stopped responding: {reason}");
            }
        }
        Ok(false)
    }

    async fn flush(&mut self) {
        let kernel = self.controller.kernel();
        if !kernel.is_alive() {
            return;
        }
        match kernel.flush().await {
            Ok(chunks) => self.printer.write_chunks(&chunks),
            Err(err) => debug!(%err, "output flush failed"),
        }
    }
}
