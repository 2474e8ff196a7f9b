//! In-memory console pane.

use super::Console;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLine {
    pub text: String,
    pub is_error: bool,
}

/// Where a batch began: the line count, plus the length of the line that was
/// still open at that point (line `start - 1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BatchMark {
    start: usize,
    open_len: Option<usize>,
}

/// Append-only console with batch undo and a line cap.
#[derive(Debug)]
pub struct ConsoleView {
    lines: Vec<ConsoleLine>,
    /// Last line has not been terminated yet.
    open: bool,
    batches: Vec<BatchMark>,
    current_batch: Option<BatchMark>,
    max_lines: usize,
}

impl Default for ConsoleView {
    fn default() -> Self {
        Self::new(5000)
    }
}

impl ConsoleView {
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: Vec::new(),
            open: false,
            batches: Vec::new(),
            current_batch: None,
            max_lines: max_lines.max(1),
        }
    }

    pub fn lines(&self) -> &[ConsoleLine] {
        &self.lines
    }

    /// Whole console content, for tests and copying.
    pub fn text(&self) -> String {
        let mut text = self
            .lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        if !self.lines.is_empty() && !self.open {
            text.push('\n');
        }
        text
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.batches.clear();
        self.current_batch = None;
        self.open = false;
    }

    /// Remove everything the most recent batch appended, including text it
    /// added to a line that was still open.
    pub fn undo_last_batch(&mut self) -> bool {
        let Some(mark) = self.batches.pop() else {
            return false;
        };
        self.lines.truncate(mark.start);
        match (mark.open_len, self.lines.last_mut()) {
            (Some(len), Some(last)) => {
                last.text.truncate(len);
                self.open = true;
            }
            _ => self.open = false,
        }
        true
    }

    fn mark(&self) -> BatchMark {
        BatchMark {
            start: self.lines.len(),
            open_len: self.lines.last().filter(|_| self.open).map(|line| line.text.len()),
        }
    }

    /// Whether anything was written since `mark`.
    fn changed_since(&self, mark: BatchMark) -> bool {
        if self.lines.len() != mark.start {
            return true;
        }
        match (mark.open_len, self.lines.last()) {
            (Some(len), Some(last)) => last.text.len() != len,
            _ => false,
        }
    }

    fn push_text(&mut self, text: &str, is_error: bool) {
        let mut rest = text;
        while !rest.is_empty() {
            let (segment, terminated) = match rest.find('\n') {
                Some(end) => (&rest[..end], true),
                None => (rest, false),
            };
            rest = if terminated { &rest[segment.len() + 1..] } else { "" };
            let segment = segment.trim_end_matches('\r');

            match self.lines.last_mut() {
                Some(last) if self.open && last.is_error == is_error => last.text.push_str(segment),
                _ => self.lines.push(ConsoleLine {
                    text: segment.to_string(),
                    is_error,
                }),
            }
            self.open = !terminated;
        }
        self.enforce_cap();
    }

    fn enforce_cap(&mut self) {
        let excess = self.lines.len().saturating_sub(self.max_lines);
        if excess == 0 {
            return;
        }
        self.lines.drain(..excess);
        for mark in self.batches.iter_mut().chain(self.current_batch.as_mut()) {
            if mark.start <= excess {
                // The open line it extended is gone.
                mark.open_len = None;
            }
            mark.start = mark.start.saturating_sub(excess);
        }
    }
}

impl Console for ConsoleView {
    fn write_output(&mut self, text: &str) {
        self.push_text(text, false);
    }

    fn write_error(&mut self, text: &str) {
        self.push_text(text, true);
    }

    fn begin_batch(&mut self) {
        self.current_batch = Some(self.mark());
    }

    fn end_batch(&mut self) {
        if let Some(mark) = self.current_batch.take() {
            if self.changed_since(mark) {
                self.batches.push(mark);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::OutputChunk;

    #[test]
    fn chunks_split_into_lines() {
        let mut console = ConsoleView::default();
        console.write_chunks(&[OutputChunk::stdout("0\n1\n"), OutputChunk::stdout("2\n")]);
        assert_eq!(console.text(), "0\n1\n2\n");
        assert_eq!(console.lines().len(), 3);
    }

    #[test]
    fn partial_lines_continue_on_same_stream() {
        let mut console = ConsoleView::default();
        console.write_output("loading");
        console.write_output("... done\n");
        console.write_error("warn\n");
        assert_eq!(console.lines()[0].text, "loading... done");
        assert!(console.lines()[1].is_error);
    }

    #[test]
    fn undo_removes_last_batch_only() {
        let mut console = ConsoleView::default();
        console.write_chunks(&[OutputChunk::stdout("first\n")]);
        console.write_chunks(&[OutputChunk::stdout("a\n"), OutputChunk::stderr("b\n")]);
        assert!(console.undo_last_batch());
        assert_eq!(console.text(), "first\n");
        assert!(console.undo_last_batch());
        assert!(!console.undo_last_batch());
    }

    #[test]
    fn undo_restores_a_line_continued_by_the_batch() {
        let mut console = ConsoleView::default();
        console.write_chunks(&[OutputChunk::stdout("loading")]);
        console.write_chunks(&[OutputChunk::stdout("... done\n"), OutputChunk::stdout("next\n")]);
        assert_eq!(console.text(), "loading... done\nnext\n");

        assert!(console.undo_last_batch());
        assert_eq!(console.text(), "loading");
        console.write_output(" again\n");
        assert_eq!(console.text(), "loading again\n");
    }

    #[test]
    fn cap_drops_oldest_lines() {
        let mut console = ConsoleView::new(2);
        console.write_output("a\nb\nc\n");
        assert_eq!(console.text(), "b\nc\n");
    }
}
