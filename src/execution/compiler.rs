//! Completeness check for candidate blocks.

use std::sync::Arc;

use tracing::trace;

use super::{Kernel, OutputChunk};
use crate::block::CodeBlock;
use crate::error::Result;

/// How a block of source compiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    /// A single expression whose value should be shown.
    Expression,
    /// One or more statements.
    Statements,
    /// Valid so far, but the parser needs more lines.
    Incomplete,
    /// Invalid no matter what follows. Carries the rendered error.
    SyntaxError(Vec<OutputChunk>),
}

impl CompileOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, CompileOutcome::Expression | CompileOutcome::Statements)
    }
}

/// Asks the interpreter's own compiler whether a block is complete.
///
/// Owns no boundary logic; the controller decides which blocks to ask about.
pub struct IncrementalCompiler<K> {
    kernel: Arc<K>,
    filename: String,
}

impl<K: Kernel> IncrementalCompiler<K> {
    pub fn new(kernel: Arc<K>, filename: impl Into<String>) -> Self {
        Self {
            kernel,
            filename: filename.into(),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Classify `block`. Error line numbers match the buffer because the block
    /// is compiled at its own line offset. An empty block needs more input and
    /// never reaches the worker.
    pub async fn classify(&self, block: &CodeBlock) -> Result<CompileOutcome> {
        if block.is_empty() {
            return Ok(CompileOutcome::Incomplete);
        }
        let outcome = self
            .kernel
            .try_compile(block.start_line, &self.filename, &block.text)
            .await?;
        trace!(lines = %block.lines(), ?outcome, "probed block");
        Ok(outcome)
    }
}
