//! Statement boundary detection.
//!
//! Cheap line-prefix heuristics ([`classify`]) propose where a block starts and
//! ends; the interpreter's compiler decides which proposal is complete.

pub mod cell;
pub mod classify;
pub mod resolver;

use serde::{Deserialize, Serialize};

pub use cell::{cell_body, enclosing_cell, enclosing_marker};
pub use classify::{classify, is_cell_marker, LineClass};
pub use resolver::{resolve_start, EndCandidate, EndCandidates};

use crate::editor::TextBuffer;

/// Inclusive range of zero-based lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, line: usize) -> bool {
        self.start <= line && line <= self.end
    }

    pub fn len(&self) -> usize {
        (self.end + 1).saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

impl std::fmt::Display for LineRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "line {}", self.start + 1)
        } else {
            write!(f, "lines {}-{}", self.start + 1, self.end + 1)
        }
    }
}

/// A resolved unit of execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub start_line: usize,
    pub end_line: usize,
    /// Lines `start_line..=end_line`, right-trimmed. Empty when `end_line < start_line`.
    pub text: String,
}

impl CodeBlock {
    pub fn from_buffer<B: TextBuffer + ?Sized>(buffer: &B, start_line: usize, end_line: usize) -> Self {
        Self {
            start_line,
            end_line,
            text: buffer.text_range(start_line, end_line).trim_end().to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn lines(&self) -> LineRange {
        LineRange::new(self.start_line, self.end_line.max(self.start_line))
    }

    /// Range from the first to the last line holding code. Falls back to the
    /// whole block when it holds none.
    pub fn code_lines(&self) -> LineRange {
        let code: Vec<usize> = self
            .text
            .lines()
            .enumerate()
            .filter(|(_, line)| classify(line).is_code)
            .map(|(offset, _)| self.start_line + offset)
            .collect();
        match (code.first(), code.last()) {
            (Some(&first), Some(&last)) => LineRange::new(first, last),
            _ => self.lines(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::Snapshot;

    #[test]
    fn block_text_is_right_trimmed() {
        let buf = Snapshot::from_text("x = 1   \n\n");
        let block = CodeBlock::from_buffer(&buf, 0, 2);
        assert_eq!(block.text, "x = 1");
    }

    #[test]
    fn inverted_block_is_empty() {
        let buf = Snapshot::from_text("a\nb");
        assert!(CodeBlock::from_buffer(&buf, 1, 0).is_empty());
    }

    #[test]
    fn code_lines_skip_comments() {
        let buf = Snapshot::from_text("# head\nx = 1\n# tail\ny = 2\n# end");
        let block = CodeBlock::from_buffer(&buf, 0, 4);
        assert_eq!(block.code_lines(), LineRange::new(1, 3));
    }

    #[test]
    fn range_display_is_one_based() {
        assert_eq!(LineRange::new(0, 0).to_string(), "line 1");
        assert_eq!(LineRange::new(2, 4).to_string(), "lines 3-5");
    }
}
