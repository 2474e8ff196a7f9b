//! The probe-grow loop: find the smallest complete block around a selection.

use tracing::debug;

use super::RunMode;
use crate::block::{cell_body, enclosing_cell, is_cell_marker, resolve_start, CodeBlock, EndCandidates, LineRange};
use crate::editor::{LineSelection, Snapshot, TextBuffer};
use crate::error::Result;
use crate::execution::{CompileOutcome, IncrementalCompiler, Kernel, OutputChunk};

/// What the search settled on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// Only blank lines or comments: nothing to run.
    Empty,
    /// The block does not contain the line that was clicked.
    OutsideBlock,
    /// A complete expression or statement block.
    Ready { block: CodeBlock, expression: bool },
    Invalid { block: CodeBlock, report: Vec<OutputChunk> },
    /// A cell that never becomes complete.
    Incomplete { block: CodeBlock },
    /// No candidate compiled; the largest one is run as is.
    Exhausted { block: CodeBlock },
}

/// Resolve the block to run for `selection`.
pub async fn probe<K: Kernel>(
    compiler: &IncrementalCompiler<K>,
    buffer: &Snapshot,
    selection: LineSelection,
    mode: RunMode,
    require_cursor_inside: bool,
) -> Result<Probe> {
    if buffer.line_count() == 0 {
        return Ok(Probe::Empty);
    }
    let cell = match mode {
        RunMode::Cell => Some(enclosing_cell(buffer, selection.cursor_line)),
        RunMode::Block if !selection.has_selection && is_cell_marker(buffer.line_text(selection.start_line)) => {
            Some(cell_body(buffer, selection.start_line))
        }
        RunMode::Block => None,
    };
    match cell {
        Some(Some(range)) => probe_cell(compiler, buffer, range).await,
        Some(None) => Ok(Probe::Empty),
        None => grow(compiler, buffer, selection, require_cursor_inside).await,
    }
}

/// Cells are user-delimited: compile once, never grow.
async fn probe_cell<K: Kernel>(compiler: &IncrementalCompiler<K>, buffer: &Snapshot, range: LineRange) -> Result<Probe> {
    let block = CodeBlock::from_buffer(buffer, range.start, range.end);
    Ok(match compiler.classify(&block).await? {
        CompileOutcome::Expression => Probe::Ready { block, expression: true },
        CompileOutcome::Statements => Probe::Ready { block, expression: false },
        CompileOutcome::Incomplete => Probe::Incomplete { block },
        CompileOutcome::SyntaxError(report) => Probe::Invalid { block, report },
    })
}

async fn grow<K: Kernel>(
    compiler: &IncrementalCompiler<K>,
    buffer: &Snapshot,
    selection: LineSelection,
    require_cursor_inside: bool,
) -> Result<Probe> {
    let last_line = buffer.line_count() - 1;
    let anchor = selection.start_line.min(last_line);
    let min_end = selection.end_line.clamp(anchor, last_line);

    let mut candidates = EndCandidates::new(buffer, anchor, min_end);
    let Some(first) = candidates.next() else {
        return Ok(Probe::Empty);
    };
    if first.is_empty {
        return Ok(Probe::Empty);
    }
    let start_hint = match first.first_code_line {
        Some(line) if !first.needs_more_above => line,
        _ => anchor,
    };
    let start = resolve_start(buffer, start_hint, first.needs_more_above);

    let mut end = first.end_line.max(start);
    let (block, expression) = loop {
        let block = CodeBlock::from_buffer(buffer, start, end);
        match compiler.classify(&block).await? {
            CompileOutcome::Expression => break (block, true),
            CompileOutcome::Statements => break (block, false),
            CompileOutcome::SyntaxError(report) => return Ok(Probe::Invalid { block, report }),
            CompileOutcome::Incomplete => match candidates.find(|next| next.end_line > end) {
                Some(next) => end = next.end_line,
                None if block.is_empty() => return Ok(Probe::Empty),
                None => {
                    debug!(lines = %block.lines(), "no candidate compiled");
                    return Ok(Probe::Exhausted { block });
                }
            },
        }
    };

    if require_cursor_inside && !block.lines().contains(selection.cursor_line) {
        return Ok(Probe::OutsideBlock);
    }
    Ok(Probe::Ready { block, expression })
}
