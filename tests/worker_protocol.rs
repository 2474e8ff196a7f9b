//! End-to-end tests against a real interpreter. Skipped when `python3` is missing.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use pypad::controller::{ControllerEvent, ExecRequest, ExecState, ExecutionController, RunMode};
use pypad::editor::{BufferId, Document};
use pypad::execution::{joined_text, CompileOutcome, ExecutionResult, Kernel, WorkerChannel};
use pypad::process::InterpreterSpec;
use pypad::WorkerError;

fn python_available() -> bool {
    Command::new("python3")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

async fn start() -> Result<Option<WorkerChannel>> {
    start_with(InterpreterSpec::new("python3")).await
}

async fn start_with(spec: InterpreterSpec) -> Result<Option<WorkerChannel>> {
    if !python_available() {
        println!("python3 not found, skipping");
        return Ok(None);
    }
    Ok(Some(WorkerChannel::spawn(spec, Duration::from_secs(10)).await?))
}

/// A minimal `matplotlib` package whose `show` prints its `block` argument.
fn fake_matplotlib(dir: &Path) -> Result<()> {
    let package = dir.join("matplotlib");
    fs::create_dir(&package)?;
    fs::write(package.join("__init__.py"), "def get_backend():\n    return 'agg'\n")?;
    fs::write(
        package.join("pyplot.py"),
        "def show(*args, **kw):\n    print('block=%r' % (kw.get('block'),))\n",
    )?;
    fs::write(
        package.join("_pylab_helpers.py"),
        "class Gcf:\n    @staticmethod\n    def get_active():\n        return None\n",
    )?;
    Ok(())
}

async fn show_output(figure_events: bool) -> Result<Option<String>> {
    let dir = tempfile::tempdir()?;
    fake_matplotlib(dir.path())?;
    let spec = InterpreterSpec::new("python3").with_figure_events(figure_events);
    let Some(channel) = start_with(spec).await? else {
        return Ok(None);
    };
    channel.set_working_dir(dir.path()).await?;
    let source = "import matplotlib.pyplot as plt\nplt.show()\nplt.show(block=True)";
    assert_eq!(channel.try_compile(0, "<t>", source).await?, CompileOutcome::Statements);
    let result = channel.execute().await?;
    channel.shutdown().await;
    match result {
        ExecutionResult::Success(output) => Ok(Some(joined_text(&output))),
        other => panic!("unexpected result {other:?}"),
    }
}

/// Run the block at `line` of `text` and return its result.
async fn run_at(
    controller: &ExecutionController<WorkerChannel>,
    events: &mut tokio::sync::mpsc::UnboundedReceiver<ControllerEvent>,
    text: &str,
    line: usize,
) -> Option<ExecutionResult> {
    let mut doc = Document::from_text(BufferId(1), text, None);
    doc.set_cursor(line, 0);
    assert!(controller.trigger(ExecRequest::from_document(&doc, RunMode::Block)));
    let mut result = None;
    loop {
        let event = tokio::time::timeout(Duration::from_secs(20), events.recv())
            .await
            .expect("no progress")
            .expect("controller gone");
        match event {
            ControllerEvent::Finished { result: finished, .. } => result = Some(finished),
            ControllerEvent::State(ExecState::Idle) => return result,
            _ => {}
        }
    }
}

#[tokio::test]
async fn compiler_classifies_blocks() -> Result<()> {
    let Some(channel) = start().await? else {
        return Ok(());
    };

    assert_eq!(channel.try_compile(0, "<t>", "1 + 1").await?, CompileOutcome::Expression);
    assert_eq!(channel.try_compile(0, "<t>", "x = 1").await?, CompileOutcome::Statements);
    assert_eq!(channel.try_compile(0, "<t>", "if x:").await?, CompileOutcome::Incomplete);
    match channel.try_compile(4, "demo.py", "x = = 1").await? {
        CompileOutcome::SyntaxError(report) => {
            let text = joined_text(&report);
            assert!(text.contains("SyntaxError"), "{text}");
            assert!(text.contains("line 5"), "{text}");
        }
        other => panic!("expected a syntax error, got {other:?}"),
    }

    channel.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn loop_block_prints_every_iteration() -> Result<()> {
    let Some(channel) = start().await? else {
        return Ok(());
    };
    let (controller, mut events) = ExecutionController::new(Arc::new(channel.clone()));

    let result = run_at(&controller, &mut events, "for i in range(3):\n    print(i)\n", 0).await;
    match result {
        Some(ExecutionResult::Success(output)) => assert_eq!(joined_text(&output), "0\n1\n2\n"),
        other => panic!("unexpected result {other:?}"),
    }

    channel.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn namespace_persists_and_restart_clears_it() -> Result<()> {
    let Some(channel) = start().await? else {
        return Ok(());
    };
    let (controller, mut events) = ExecutionController::new(Arc::new(channel.clone()));

    run_at(&controller, &mut events, "x = 41", 0).await;
    let result = run_at(&controller, &mut events, "x + 1", 0).await;
    assert_eq!(result, Some(ExecutionResult::Value("42".to_string())));

    channel.restart().await?;
    controller.forget_working_dir();
    let result = run_at(&controller, &mut events, "x + 1", 0).await;
    match result {
        Some(ExecutionResult::RuntimeError(output)) => {
            assert!(joined_text(&output).contains("NameError"));
        }
        other => panic!("unexpected result {other:?}"),
    }

    channel.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn runtime_errors_keep_the_worker_alive() -> Result<()> {
    let Some(channel) = start().await? else {
        return Ok(());
    };
    let (controller, mut events) = ExecutionController::new(Arc::new(channel.clone()));

    let result = run_at(&controller, &mut events, "1 / 0", 0).await;
    assert!(matches!(result, Some(ExecutionResult::RuntimeError(_))));
    assert!(channel.is_alive());
    let result = run_at(&controller, &mut events, "'still here'", 0).await;
    assert_eq!(result, Some(ExecutionResult::Value("'still here'".to_string())));

    channel.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn flush_collects_stderr_left_by_an_expression() -> Result<()> {
    let Some(channel) = start().await? else {
        return Ok(());
    };

    assert_eq!(
        channel
            .try_compile(0, "<t>", "__import__('sys').stderr.write('warn\\n')")
            .await?,
        CompileOutcome::Expression
    );
    let result = channel.evaluate().await?;
    assert_eq!(result, ExecutionResult::Value("5".to_string()));
    let flushed = channel.flush().await?;
    assert_eq!(joined_text(&flushed), "warn\n");
    assert!(flushed.iter().all(|chunk| chunk.is_error()));

    channel.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn calls_fail_fast_after_shutdown() -> Result<()> {
    let Some(channel) = start().await? else {
        return Ok(());
    };
    channel.shutdown().await;

    assert!(!channel.is_alive());
    assert!(matches!(
        channel.try_compile(0, "<t>", "1").await,
        Err(WorkerError::NotAlive)
    ));
    Ok(())
}

#[tokio::test]
async fn plt_show_defaults_to_non_blocking() -> Result<()> {
    if let Some(text) = show_output(true).await? {
        assert_eq!(text, "block=False\nblock=True\n");
    }
    Ok(())
}

#[tokio::test]
async fn plt_show_is_untouched_when_figure_events_are_off() -> Result<()> {
    if let Some(text) = show_output(false).await? {
        assert_eq!(text, "block=None\nblock=True\n");
    }
    Ok(())
}
