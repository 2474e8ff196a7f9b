//! Execution engine: result types, the worker channel and the compile oracle.

use std::future::Future;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod channel;
pub mod compiler;
pub mod protocol;

pub use channel::WorkerChannel;
pub use compiler::{CompileOutcome, IncrementalCompiler};

/// Which stream a piece of output was written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    Stdout,
    Stderr,
}

/// A run of text captured from one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputChunk {
    pub stream: Stream,
    pub text: String,
}

impl OutputChunk {
    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            stream: Stream::Stdout,
            text: text.into(),
        }
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        Self {
            stream: Stream::Stderr,
            text: text.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.stream == Stream::Stderr
    }
}

/// Concatenate the text of every chunk.
pub fn joined_text(chunks: &[OutputChunk]) -> String {
    chunks.iter().map(|chunk| chunk.text.as_str()).collect()
}

/// Outcome of running one code block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// The block still needs more lines.
    Incomplete,
    SyntaxError(Vec<OutputChunk>),
    /// `repr` of an expression, preceded by anything it printed.
    Value(String),
    Success(Vec<OutputChunk>),
    RuntimeError(Vec<OutputChunk>),
}

impl ExecutionResult {
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            ExecutionResult::Incomplete | ExecutionResult::SyntaxError(_) | ExecutionResult::RuntimeError(_)
        )
    }

    /// What the console should show for this result.
    pub fn console_chunks(&self) -> Vec<OutputChunk> {
        match self {
            ExecutionResult::Incomplete => {
                vec![OutputChunk::stderr("SyntaxError: incomplete input\n")]
            }
            ExecutionResult::Value(text) => vec![OutputChunk::stdout(format!("{text}\n"))],
            ExecutionResult::SyntaxError(output)
            | ExecutionResult::Success(output)
            | ExecutionResult::RuntimeError(output) => output.clone(),
        }
    }
}

/// Operations the execution controller needs from an interpreter.
///
/// [`WorkerChannel`] is the real implementation; tests substitute their own.
pub trait Kernel: Send + Sync + 'static {
    /// Classify `source` as it would compile at `line_offset` in `filename`.
    /// A successful classification is remembered for the next
    /// [`Kernel::evaluate`] or [`Kernel::execute`].
    fn try_compile(
        &self,
        line_offset: usize,
        filename: &str,
        source: &str,
    ) -> impl Future<Output = Result<CompileOutcome>> + Send;

    /// Evaluate the last compiled expression.
    fn evaluate(&self) -> impl Future<Output = Result<ExecutionResult>> + Send;

    /// Execute the last compiled statements.
    fn execute(&self) -> impl Future<Output = Result<ExecutionResult>> + Send;

    /// Compile and execute `source` in one step, without the completeness check.
    fn execute_source(
        &self,
        line_offset: usize,
        filename: &str,
        source: &str,
    ) -> impl Future<Output = Result<ExecutionResult>> + Send;

    fn set_working_dir(&self, path: &Path) -> impl Future<Output = Result<()>> + Send;
}
