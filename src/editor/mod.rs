//! Editor collaborators: buffer text access, selections, markers and console output.
//!
//! Everything here is line-oriented. Algorithms take a [`TextBuffer`] and work
//! with zero-based line indices, never byte offsets.

use std::sync::Arc;

use crate::execution::{OutputChunk, Stream};

pub mod console;
pub mod document;
pub mod markers;

pub use console::ConsoleView;
pub use document::{Document, EditEvent};
pub use markers::{Marker, MarkerBook, MarkerState};

/// Read access to the lines of a text buffer.
pub trait TextBuffer {
    fn line_count(&self) -> usize;

    /// Text of `line` without its line terminator. Out-of-range lines are empty.
    fn line_text(&self, line: usize) -> &str;

    /// Lines `start..=end` joined with `\n`. Empty when `end < start`.
    fn text_range(&self, start: usize, end: usize) -> String {
        if end < start || start >= self.line_count() {
            return String::new();
        }
        let end = end.min(self.line_count() - 1);
        (start..=end)
            .map(|line| self.line_text(line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl TextBuffer for [String] {
    fn line_count(&self) -> usize {
        self.len()
    }

    fn line_text(&self, line: usize) -> &str {
        self.get(line).map(String::as_str).unwrap_or("")
    }
}

impl TextBuffer for Vec<String> {
    fn line_count(&self) -> usize {
        self.len()
    }

    fn line_text(&self, line: usize) -> &str {
        self.as_slice().line_text(line)
    }
}

/// Identity of an open buffer. Markers and working-directory tracking key on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

impl std::fmt::Display for BufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Immutable copy of a buffer's lines, taken when an execution is triggered.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    lines: Arc<Vec<String>>,
}

impl Snapshot {
    pub fn new(lines: Vec<String>) -> Self {
        Self {
            lines: Arc::new(lines),
        }
    }

    /// Split `text` into lines the way an editor shows them.
    pub fn from_text(text: &str) -> Self {
        Self::new(split_lines(text))
    }
}

impl TextBuffer for Snapshot {
    fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn line_text(&self, line: usize) -> &str {
        self.lines.as_slice().line_text(line)
    }
}

/// Split text into lines, dropping `\r` terminators. A trailing newline yields
/// a final empty line, as in an editor.
pub fn split_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}

/// Cursor and selection, reduced to whole lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineSelection {
    /// First selected line, or the cursor line.
    pub start_line: usize,
    /// Last selected line. A selection that ends at column 0 does not include
    /// that line.
    pub end_line: usize,
    pub cursor_line: usize,
    /// Whether a non-empty selection exists.
    pub has_selection: bool,
}

impl LineSelection {
    /// A bare cursor with no selection.
    pub fn cursor(line: usize) -> Self {
        Self {
            start_line: line,
            end_line: line,
            cursor_line: line,
            has_selection: false,
        }
    }

    /// An explicit selection over `start..=end`, cursor at the end.
    pub fn lines(start: usize, end: usize) -> Self {
        Self {
            start_line: start,
            end_line: end.max(start),
            cursor_line: end.max(start),
            has_selection: true,
        }
    }
}

/// Sink for execution output.
pub trait Console {
    fn write_output(&mut self, text: &str);

    fn write_error(&mut self, text: &str);

    /// Open an undo group. Everything written until [`Console::end_batch`] is one unit.
    fn begin_batch(&mut self) {}

    fn end_batch(&mut self) {}

    /// Append chunks as a single batch.
    fn write_chunks(&mut self, chunks: &[OutputChunk]) {
        if chunks.is_empty() {
            return;
        }
        self.begin_batch();
        for chunk in chunks {
            match chunk.stream {
                Stream::Stdout => self.write_output(&chunk.text),
                Stream::Stderr => self.write_error(&chunk.text),
            }
        }
        self.end_batch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_range_joins_inclusive_lines() {
        let snapshot = Snapshot::from_text("a\nb\nc");
        assert_eq!(snapshot.text_range(0, 1), "a\nb");
        assert_eq!(snapshot.text_range(1, 9), "b\nc");
        assert_eq!(snapshot.text_range(2, 1), "");
    }

    #[test]
    fn split_lines_keeps_trailing_empty_line() {
        assert_eq!(split_lines("x\r\ny\n"), vec!["x", "y", ""]);
        assert_eq!(split_lines(""), vec![""]);
    }

    #[test]
    fn out_of_range_line_is_empty() {
        let snapshot = Snapshot::from_text("only");
        assert_eq!(snapshot.line_text(5), "");
    }
}
