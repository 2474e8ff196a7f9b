//! Interpreter process management (startup and pipes).

use std::path::PathBuf;

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout};

use crate::error::Result;

pub mod python;

/// How to launch the interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterSpec {
    /// Program name or path, e.g. `python3`.
    pub program: String,
    /// Directory the worker starts in. Defaults to the user's home.
    pub working_dir: Option<PathBuf>,
    /// Make `plt.show()` non-blocking and keep figure windows responsive
    /// between runs.
    pub figure_events: bool,
}

impl InterpreterSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            working_dir: directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf()),
            figure_events: true,
        }
    }

    pub fn with_figure_events(mut self, enabled: bool) -> Self {
        self.figure_events = enabled;
        self
    }
}

impl Default for InterpreterSpec {
    fn default() -> Self {
        Self::new(python::default_program())
    }
}

/// A running worker with its pipes split off.
pub struct ProcessHandle {
    pub child: Child,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub stderr: Option<ChildStderr>,
}

/// Start the Python worker described by `spec`.
pub async fn start(spec: &InterpreterSpec) -> Result<ProcessHandle> {
    python::start_python(spec, python::WORKER_SCRIPT).await
}
