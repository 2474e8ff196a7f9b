use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, Notify};

use pypad::block::LineRange;
use pypad::controller::{ControllerEvent, ExecRequest, ExecState, ExecutionController, RunMode};
use pypad::editor::{BufferId, Document, MarkerState};
use pypad::execution::{CompileOutcome, ExecutionResult, Kernel, OutputChunk};
use pypad::WorkerError;

const BUF: BufferId = BufferId(1);

/// Answers compiles from a table (unknown sources are incomplete) and records
/// every call it receives.
#[derive(Default)]
struct FakeKernel {
    outcomes: HashMap<String, CompileOutcome>,
    calls: Mutex<Vec<String>>,
    gate: Option<Arc<Notify>>,
    lose_worker: bool,
}

impl FakeKernel {
    fn with(outcomes: &[(&str, CompileOutcome)]) -> Self {
        Self {
            outcomes: outcomes
                .iter()
                .map(|(source, outcome)| (source.to_string(), outcome.clone()))
                .collect(),
            ..Self::default()
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|call| call.starts_with(prefix)).count()
    }

    async fn run(&self, call: String) -> pypad::Result<ExecutionResult> {
        self.record(call.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.lose_worker {
            return Err(WorkerError::NoAnswer);
        }
        Ok(ExecutionResult::Success(vec![OutputChunk::stdout(format!("ran {call}\n"))]))
    }
}

impl Kernel for FakeKernel {
    async fn try_compile(&self, line_offset: usize, _filename: &str, source: &str) -> pypad::Result<CompileOutcome> {
        self.record(format!("compile {line_offset}: {source}"));
        Ok(self
            .outcomes
            .get(source)
            .cloned()
            .unwrap_or(CompileOutcome::Incomplete))
    }

    async fn evaluate(&self) -> pypad::Result<ExecutionResult> {
        self.record("evaluate".to_string());
        Ok(ExecutionResult::Value("2".to_string()))
    }

    async fn execute(&self) -> pypad::Result<ExecutionResult> {
        self.run("execute".to_string()).await
    }

    async fn execute_source(&self, _line_offset: usize, _filename: &str, source: &str) -> pypad::Result<ExecutionResult> {
        self.run(format!("source: {source}")).await
    }

    async fn set_working_dir(&self, path: &Path) -> pypad::Result<()> {
        self.record(format!("chdir {}", path.display()));
        Ok(())
    }
}

fn request(text: &str, cursor_line: usize) -> ExecRequest {
    let mut doc = Document::from_text(BUF, text, None);
    doc.set_cursor(cursor_line, 0);
    ExecRequest::from_document(&doc, RunMode::Block)
}

/// Events of one request, up to and including the return to idle.
async fn drain(events: &mut mpsc::UnboundedReceiver<ControllerEvent>) -> Vec<ControllerEvent> {
    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("controller stalled")
            .expect("controller dropped");
        let idle = event == ControllerEvent::State(ExecState::Idle);
        seen.push(event);
        if idle {
            return seen;
        }
    }
}

fn finished(events: &[ControllerEvent]) -> Option<&ExecutionResult> {
    events.iter().find_map(|event| match event {
        ControllerEvent::Finished { result, .. } => Some(result),
        _ => None,
    })
}

#[tokio::test]
async fn statement_runs_and_markers_go_active_then_finished() {
    let kernel = Arc::new(FakeKernel::with(&[("x = 1", CompileOutcome::Statements)]));
    let (controller, mut events) = ExecutionController::new(kernel.clone());

    assert!(controller.trigger(request("x = 1\ny = 2\n", 0)));
    let seen = drain(&mut events).await;

    let lines = LineRange::new(0, 0);
    assert_eq!(
        seen,
        vec![
            ControllerEvent::State(ExecState::Probing),
            ControllerEvent::State(ExecState::Resolved),
            ControllerEvent::Markers { buffer: BUF, lines, state: MarkerState::Active },
            ControllerEvent::MoveCursor { buffer: BUF, line: 1 },
            ControllerEvent::State(ExecState::Running),
            ControllerEvent::State(ExecState::Success),
            ControllerEvent::Markers { buffer: BUF, lines, state: MarkerState::Finished },
            ControllerEvent::Finished {
                buffer: BUF,
                lines,
                result: ExecutionResult::Success(vec![OutputChunk::stdout("ran execute\n")]),
            },
            ControllerEvent::State(ExecState::Idle),
        ]
    );
    assert_eq!(kernel.calls(), vec!["compile 0: x = 1", "execute"]);
    assert_eq!(controller.state(), ExecState::Idle);
}

#[tokio::test]
async fn expressions_are_evaluated() {
    let kernel = Arc::new(FakeKernel::with(&[("1 + 1", CompileOutcome::Expression)]));
    let (controller, mut events) = ExecutionController::new(kernel.clone());

    assert!(controller.trigger(request("1 + 1", 0)));
    let seen = drain(&mut events).await;

    assert_eq!(finished(&seen), Some(&ExecutionResult::Value("2".to_string())));
    assert_eq!(kernel.count("evaluate"), 1);
    assert_eq!(kernel.count("execute"), 0);
}

#[tokio::test]
async fn second_trigger_is_dropped_while_running() {
    let gate = Arc::new(Notify::new());
    let kernel = Arc::new(FakeKernel {
        gate: Some(gate.clone()),
        ..FakeKernel::with(&[("x = 1", CompileOutcome::Statements)])
    });
    let (controller, mut events) = ExecutionController::new(kernel.clone());

    assert!(controller.trigger(request("x = 1", 0)));
    assert!(!controller.trigger(request("x = 1", 0)));
    gate.notify_one();
    drain(&mut events).await;

    assert_eq!(kernel.count("execute"), 1);
    assert!(controller.trigger(request("x = 1", 0)));
    gate.notify_one();
    drain(&mut events).await;
    assert_eq!(kernel.count("execute"), 2);
}

#[tokio::test]
async fn blank_and_comment_lines_run_nothing() {
    let kernel = Arc::new(FakeKernel::default());
    let (controller, mut events) = ExecutionController::new(kernel.clone());

    assert!(controller.trigger(request("# just a note\n\n", 0)));
    let seen = drain(&mut events).await;

    assert_eq!(
        seen,
        vec![
            ControllerEvent::State(ExecState::Probing),
            ControllerEvent::ClearMarkers { buffer: BUF },
            ControllerEvent::State(ExecState::Idle),
        ]
    );
    assert!(kernel.calls().is_empty());
}

#[tokio::test]
async fn syntax_error_is_reported_without_running() {
    let report = vec![OutputChunk::stderr("SyntaxError: invalid syntax\n")];
    let kernel = Arc::new(FakeKernel::with(&[(
        "x = = 1",
        CompileOutcome::SyntaxError(report.clone()),
    )]));
    let (controller, mut events) = ExecutionController::new(kernel.clone());

    assert!(controller.trigger(request("y = 0\nx = = 1\n", 1)));
    let seen = drain(&mut events).await;

    let lines = LineRange::new(1, 1);
    assert!(seen.contains(&ControllerEvent::State(ExecState::Failed)));
    assert!(seen.contains(&ControllerEvent::Markers { buffer: BUF, lines, state: MarkerState::Error }));
    assert!(seen.contains(&ControllerEvent::MoveCursor { buffer: BUF, line: 1 }));
    assert_eq!(finished(&seen), Some(&ExecutionResult::SyntaxError(report)));
    assert_eq!(kernel.count("execute"), 0);
    assert_eq!(kernel.count("source"), 0);
}

#[tokio::test]
async fn block_that_never_compiles_runs_as_is() {
    let kernel = Arc::new(FakeKernel::default());
    let (controller, mut events) = ExecutionController::new(kernel.clone());

    assert!(controller.trigger(request("foo(\n    1,\n", 0)));
    let seen = drain(&mut events).await;

    let sources: Vec<String> = kernel
        .calls()
        .into_iter()
        .filter(|call| call.starts_with("source: "))
        .collect();
    assert_eq!(sources.len(), 1);
    assert!(sources[0].starts_with("source: foo("));
    assert!(sources[0].contains("1,"));
    assert!(matches!(finished(&seen), Some(ExecutionResult::Success(_))));
    assert!(seen.iter().any(|event| matches!(
        event,
        ControllerEvent::Markers { state: MarkerState::Finished, .. }
    )));
}

#[tokio::test]
async fn click_outside_the_block_is_ignored() {
    let kernel = Arc::new(FakeKernel::with(&[("x = 2", CompileOutcome::Statements)]));
    let (controller, mut events) = ExecutionController::new(kernel.clone());

    let doc = Document::from_text(BUF, "y = 1\n\nx = 2\n", None);
    let click = ExecRequest::from_document(&doc, RunMode::Block).clicked_at(1);
    assert!(controller.trigger(click));
    let seen = drain(&mut events).await;

    assert!(seen.contains(&ControllerEvent::ClearMarkers { buffer: BUF }));
    assert!(finished(&seen).is_none());
    assert_eq!(kernel.count("execute"), 0);
}

#[tokio::test]
async fn lost_worker_paints_error_and_aborts() {
    let kernel = Arc::new(FakeKernel {
        lose_worker: true,
        ..FakeKernel::with(&[("x = 1", CompileOutcome::Statements)])
    });
    let (controller, mut events) = ExecutionController::new(kernel.clone());

    assert!(controller.trigger(request("x = 1", 0)));
    let seen = drain(&mut events).await;

    assert!(finished(&seen).is_none());
    assert!(seen.contains(&ControllerEvent::Markers {
        buffer: BUF,
        lines: LineRange::new(0, 0),
        state: MarkerState::Error,
    }));
    assert!(seen.iter().any(|event| matches!(event, ControllerEvent::Aborted { .. })));
    assert!(!seen.iter().any(|event| matches!(
        event,
        ControllerEvent::Markers { state: MarkerState::Finished, .. }
    )));
    assert_eq!(controller.state(), ExecState::Idle);
}

#[tokio::test]
async fn working_directory_is_sent_once_per_buffer() -> Result<()> {
    let kernel = Arc::new(FakeKernel::with(&[("x = 1", CompileOutcome::Statements)]));
    let (controller, mut events) = ExecutionController::new(kernel.clone());

    let dir = tempfile::tempdir()?;
    let path: PathBuf = dir.path().join("script.py");
    let doc = Document::from_text(BUF, "x = 1", Some(path));
    let other = Document::from_text(BufferId(2), "x = 1", Some(dir.path().join("other.py")));

    for next in [&doc, &doc, &other, &doc] {
        assert!(controller.trigger(ExecRequest::from_document(next, RunMode::Block)));
        drain(&mut events).await;
    }
    assert_eq!(kernel.count("chdir"), 3);

    controller.forget_working_dir();
    assert!(controller.trigger(ExecRequest::from_document(&doc, RunMode::Block)));
    drain(&mut events).await;
    assert_eq!(kernel.count("chdir"), 4);
    Ok(())
}

#[tokio::test]
async fn cell_mode_runs_the_whole_cell_at_once() {
    let cell = "a = 1\nb = 2";
    let kernel = Arc::new(FakeKernel::with(&[(cell, CompileOutcome::Statements)]));
    let (controller, mut events) = ExecutionController::new(kernel.clone());

    let mut doc = Document::from_text(BUF, "#%% setup\na = 1\nb = 2\n\n#%% next\nc = 3\n", None);
    doc.set_cursor(2, 0);
    assert!(controller.trigger(ExecRequest::from_document(&doc, RunMode::Cell)));
    let seen = drain(&mut events).await;

    assert_eq!(kernel.calls(), vec![format!("compile 1: {cell}"), "execute".to_string()]);
    assert!(seen.contains(&ControllerEvent::Markers {
        buffer: BUF,
        lines: LineRange::new(1, 2),
        state: MarkerState::Finished,
    }));
}
