//! Python interpreter bootstrap.

use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use super::{InterpreterSpec, ProcessHandle};
use crate::error::{Result, WorkerError};

/// Worker loop run inside the interpreter.
pub const WORKER_SCRIPT: &str = include_str!("worker.py");

/// Interpreter used when none is configured.
pub fn default_program() -> &'static str {
    if cfg!(windows) {
        "python"
    } else {
        "python3"
    }
}

/// Spawn `python -u -c <bootstrap>` with all three pipes captured.
pub async fn start_python(spec: &InterpreterSpec, bootstrap: &str) -> Result<ProcessHandle> {
    let mut cmd = Command::new(&spec.program);
    cmd.arg("-u") // unbuffered
        .arg("-c")
        .arg(bootstrap)
        .env("PYTHONIOENCODING", "utf-8")
        .env("PYPAD_FIGURE_EVENTS", if spec.figure_events { "1" } else { "0" })
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = spec.working_dir.as_deref().filter(|dir| dir.is_dir()) {
        cmd.current_dir(dir);
    }

    let mut child = cmd.spawn().map_err(|source| WorkerError::Spawn {
        program: spec.program.clone(),
        source,
    })?;
    debug!(program = %spec.program, pid = ?child.id(), "started python worker");

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| WorkerError::Protocol("worker has no stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| WorkerError::Protocol("worker has no stdout".into()))?;
    let stderr = child.stderr.take();

    Ok(ProcessHandle {
        child,
        stdin,
        stdout,
        stderr,
    })
}
