//! Editable in-memory buffer with a cursor and an optional selection.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::{split_lines, BufferId, LineSelection, Snapshot, TextBuffer};
use crate::utils::unicode::char_to_byte_index;

/// Spaces inserted for a tab and added after a line ending in `:`.
const INDENT: &str = "    ";

/// Character position: zero-based line and character (not byte) column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Where an edit happened and how many lines it added (positive) or removed
/// (negative) after `line`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditEvent {
    pub line: usize,
    pub lines_delta: isize,
    /// Lines after `line` that were deleted, before anything was inserted.
    /// A replacement can remove lines with a net delta of zero.
    pub lines_removed: usize,
}

impl EditEvent {
    /// An edit that only removes (negative delta) or only inserts lines.
    pub fn new(line: usize, lines_delta: isize) -> Self {
        Self {
            line,
            lines_delta,
            lines_removed: lines_delta.min(0).unsigned_abs(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub id: BufferId,
    pub path: Option<PathBuf>,
    lines: Vec<String>,
    cursor: Position,
    anchor: Option<Position>,
    modified: bool,
}

impl Document {
    pub fn new(id: BufferId) -> Self {
        Self::from_text(id, "", None)
    }

    pub fn from_text(id: BufferId, text: &str, path: Option<PathBuf>) -> Self {
        Self {
            id,
            path,
            lines: split_lines(text),
            cursor: Position::default(),
            anchor: None,
            modified: false,
        }
    }

    /// Load `path`. A missing file opens as an empty buffer that will be
    /// created on save.
    pub fn open(id: BufferId, path: &Path) -> Result<Self> {
        let text = if path.exists() {
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
        } else {
            String::new()
        };
        Ok(Self::from_text(id, &text, Some(path.to_path_buf())))
    }

    pub fn save(&mut self) -> Result<()> {
        let path = self.path.as_ref().context("buffer has no file name")?;
        fs::write(path, self.lines.join("\n")).with_context(|| format!("writing {}", path.display()))?;
        self.modified = false;
        Ok(())
    }

    /// Reload from disk, discarding edits.
    pub fn reload(&mut self) -> Result<()> {
        let path = self.path.clone().context("buffer has no file name")?;
        let fresh = Self::open(self.id, &path)?;
        self.lines = fresh.lines;
        self.anchor = None;
        self.clamp_cursor();
        self.modified = false;
        Ok(())
    }

    /// Short name for titles.
    pub fn name(&self) -> String {
        self.path
            .as_ref()
            .and_then(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "untitled".to_string())
    }

    /// Name the interpreter reports in tracebacks.
    pub fn source_name(&self) -> String {
        self.path
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "<untitled>".to_string())
    }

    /// Directory of the file, made absolute.
    pub fn working_dir(&self) -> Option<PathBuf> {
        let path = self.path.as_ref()?;
        let absolute = if path.is_absolute() {
            path.clone()
        } else {
            std::env::current_dir().ok()?.join(path)
        };
        absolute.parent().map(Path::to_path_buf)
    }

    /// Only Python sources (or files without an extension) are executable.
    pub fn is_python(&self) -> bool {
        match self.path.as_ref().and_then(|path| path.extension()) {
            None => true,
            Some(ext) => ext.eq_ignore_ascii_case("py") || ext.eq_ignore_ascii_case("pyw"),
        }
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.lines.clone())
    }

    pub fn cursor(&self) -> Position {
        self.cursor
    }

    pub fn set_cursor(&mut self, line: usize, column: usize) {
        self.anchor = None;
        self.cursor = Position::new(line, column);
        self.clamp_cursor();
    }

    /// Ordered selection bounds, if a non-empty selection exists.
    pub fn selection(&self) -> Option<(Position, Position)> {
        let anchor = self.anchor?;
        match anchor.cmp(&self.cursor) {
            std::cmp::Ordering::Less => Some((anchor, self.cursor)),
            std::cmp::Ordering::Greater => Some((self.cursor, anchor)),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn clear_selection(&mut self) {
        self.anchor = None;
    }

    /// Select whole lines `start..=end`, cursor at the start of the line after.
    pub fn select_lines(&mut self, start: usize, end: usize) {
        let last = self.lines.len() - 1;
        let end = end.min(last);
        self.anchor = Some(Position::new(start.min(end), 0));
        self.cursor = if end < last {
            Position::new(end + 1, 0)
        } else {
            Position::new(end, self.line_len(end))
        };
    }

    /// Cursor and selection reduced to lines, the way execution requests see them.
    pub fn line_selection(&self) -> LineSelection {
        match self.selection() {
            Some((start, end)) => {
                let end_line = if end.column == 0 && end.line > start.line {
                    end.line - 1
                } else {
                    end.line
                };
                LineSelection {
                    start_line: start.line,
                    end_line,
                    cursor_line: self.cursor.line,
                    has_selection: true,
                }
            }
            None => LineSelection::cursor(self.cursor.line),
        }
    }

    pub fn selected_text(&self) -> Option<String> {
        let (start, end) = self.selection()?;
        if start.line == end.line {
            let line = &self.lines[start.line];
            let from = char_to_byte_index(line, start.column);
            let to = char_to_byte_index(line, end.column);
            return Some(line[from..to].to_string());
        }
        let first = &self.lines[start.line];
        let last = &self.lines[end.line];
        let mut parts = vec![first[char_to_byte_index(first, start.column)..].to_string()];
        parts.extend(self.lines[start.line + 1..end.line].iter().cloned());
        parts.push(last[..char_to_byte_index(last, end.column)].to_string());
        Some(parts.join("\n"))
    }

    // --- cursor movement ---

    fn begin_move(&mut self, extend: bool) {
        if extend {
            self.anchor.get_or_insert(self.cursor);
        } else {
            self.anchor = None;
        }
    }

    pub fn move_left(&mut self, extend: bool) {
        self.begin_move(extend);
        if self.cursor.column > 0 {
            self.cursor.column -= 1;
        } else if self.cursor.line > 0 {
            self.cursor.line -= 1;
            self.cursor.column = self.line_len(self.cursor.line);
        }
    }

    pub fn move_right(&mut self, extend: bool) {
        self.begin_move(extend);
        if self.cursor.column < self.line_len(self.cursor.line) {
            self.cursor.column += 1;
        } else if self.cursor.line + 1 < self.lines.len() {
            self.cursor.line += 1;
            self.cursor.column = 0;
        }
    }

    pub fn move_up(&mut self, rows: usize, extend: bool) {
        self.begin_move(extend);
        self.cursor.line = self.cursor.line.saturating_sub(rows);
        self.clamp_cursor();
    }

    pub fn move_down(&mut self, rows: usize, extend: bool) {
        self.begin_move(extend);
        self.cursor.line = (self.cursor.line + rows).min(self.lines.len() - 1);
        self.clamp_cursor();
    }

    pub fn move_home(&mut self, extend: bool) {
        self.begin_move(extend);
        self.cursor.column = 0;
    }

    pub fn move_end(&mut self, extend: bool) {
        self.begin_move(extend);
        self.cursor.column = self.line_len(self.cursor.line);
    }

    // --- editing ---

    pub fn insert_char(&mut self, c: char) -> EditEvent {
        if c == '\n' {
            return self.insert_newline();
        }
        let removed = self.delete_selection();
        let line = &mut self.lines[self.cursor.line];
        let at = char_to_byte_index(line, self.cursor.column);
        line.insert(at, c);
        self.cursor.column += 1;
        self.modified = true;
        merge(removed, self.cursor.line, 0)
    }

    /// Split the line at the cursor, carrying its indentation (one level more
    /// after a `:`).
    pub fn insert_newline(&mut self) -> EditEvent {
        let removed = self.delete_selection();
        let line_index = self.cursor.line;
        let line = &mut self.lines[line_index];
        let at = char_to_byte_index(line, self.cursor.column);
        let tail = line.split_off(at);
        let mut indent: String = line.chars().take_while(|c| *c == ' ' || *c == '\t').collect();
        if line.trim_end().ends_with(':') {
            indent.push_str(INDENT);
        }
        self.cursor = Position::new(line_index + 1, indent.chars().count());
        self.lines.insert(line_index + 1, indent + tail.trim_start());
        self.modified = true;
        merge(removed, line_index, 1)
    }

    /// Insert text that may span lines (paste).
    pub fn insert_str(&mut self, text: &str) -> EditEvent {
        let removed = self.delete_selection();
        let start_line = self.cursor.line;
        let mut pieces = split_lines(text).into_iter();
        let first = pieces.next().unwrap_or_default();
        let rest: Vec<String> = pieces.collect();

        let line = &mut self.lines[start_line];
        let at = char_to_byte_index(line, self.cursor.column);
        let tail = line.split_off(at);
        line.push_str(&first);

        if rest.is_empty() {
            self.cursor.column += first.chars().count();
            line.push_str(&tail);
        } else {
            let added = rest.len();
            let last_index = start_line + added;
            for (offset, piece) in rest.into_iter().enumerate() {
                self.lines.insert(start_line + 1 + offset, piece);
            }
            let last = &mut self.lines[last_index];
            self.cursor = Position::new(last_index, last.chars().count());
            last.push_str(&tail);
        }
        self.modified = true;
        merge(removed, start_line, (self.cursor.line - start_line) as isize)
    }

    pub fn insert_tab(&mut self) -> EditEvent {
        self.insert_str(INDENT)
    }

    pub fn backspace(&mut self) -> Option<EditEvent> {
        if self.selection().is_some() {
            return self.delete_selection();
        }
        self.anchor = None;
        if self.cursor.column > 0 {
            let line = &mut self.lines[self.cursor.line];
            let at = char_to_byte_index(line, self.cursor.column - 1);
            line.remove(at);
            self.cursor.column -= 1;
            self.modified = true;
            Some(EditEvent::new(self.cursor.line, 0))
        } else if self.cursor.line > 0 {
            let current = self.lines.remove(self.cursor.line);
            self.cursor.line -= 1;
            self.cursor.column = self.line_len(self.cursor.line);
            self.lines[self.cursor.line].push_str(&current);
            self.modified = true;
            Some(EditEvent::new(self.cursor.line, -1))
        } else {
            None
        }
    }

    pub fn delete(&mut self) -> Option<EditEvent> {
        if self.selection().is_some() {
            return self.delete_selection();
        }
        self.anchor = None;
        let line_len = self.line_len(self.cursor.line);
        if self.cursor.column < line_len {
            let line = &mut self.lines[self.cursor.line];
            let at = char_to_byte_index(line, self.cursor.column);
            line.remove(at);
            self.modified = true;
            Some(EditEvent::new(self.cursor.line, 0))
        } else if self.cursor.line + 1 < self.lines.len() {
            let next = self.lines.remove(self.cursor.line + 1);
            self.lines[self.cursor.line].push_str(&next);
            self.modified = true;
            Some(EditEvent::new(self.cursor.line, -1))
        } else {
            None
        }
    }

    /// Append an empty line at the end of the buffer.
    pub fn append_empty_line(&mut self) -> EditEvent {
        let line = self.lines.len() - 1;
        self.lines.push(String::new());
        self.modified = true;
        EditEvent::new(line, 1)
    }

    /// Remove the selected text. Returns the edit, if anything was selected.
    pub fn delete_selection(&mut self) -> Option<EditEvent> {
        let (start, end) = self.selection()?;
        self.anchor = None;
        let tail = {
            let last = &self.lines[end.line];
            last[char_to_byte_index(last, end.column)..].to_string()
        };
        let first = &mut self.lines[start.line];
        first.truncate(char_to_byte_index(first, start.column));
        first.push_str(&tail);
        self.lines.drain(start.line + 1..=end.line);
        self.cursor = start;
        self.modified = true;
        Some(EditEvent::new(start.line, -((end.line - start.line) as isize)))
    }

    fn line_len(&self, line: usize) -> usize {
        self.lines.get(line).map_or(0, |text| text.chars().count())
    }

    fn clamp_cursor(&mut self) {
        if self.lines.is_empty() {
            self.lines.push(String::new());
        }
        self.cursor.line = self.cursor.line.min(self.lines.len() - 1);
        self.cursor.column = self.cursor.column.min(self.line_len(self.cursor.line));
    }
}

/// Fold a selection deletion into the edit that followed it.
fn merge(removed: Option<EditEvent>, line: usize, lines_delta: isize) -> EditEvent {
    match removed {
        Some(removed) => EditEvent {
            line: removed.line.min(line),
            lines_delta: removed.lines_delta + lines_delta,
            lines_removed: removed.lines_removed,
        },
        None => EditEvent::new(line, lines_delta),
    }
}

impl TextBuffer for Document {
    fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn line_text(&self, line: usize) -> &str {
        self.lines.as_slice().line_text(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::from_text(BufferId(1), text, None)
    }

    #[test]
    fn newline_keeps_and_deepens_indent() {
        let mut d = doc("def f():");
        d.move_end(false);
        let edit = d.insert_newline();
        assert_eq!(edit, EditEvent::new(0, 1));
        assert_eq!(d.line_text(1), "    ");
        assert_eq!(d.cursor(), Position::new(1, 4));
    }

    #[test]
    fn selection_ending_at_column_zero_excludes_that_line() {
        let mut d = doc("a = 1\nb = 2\nc = 3");
        d.select_lines(0, 1);
        let selection = d.line_selection();
        assert!(selection.has_selection);
        assert_eq!((selection.start_line, selection.end_line), (0, 1));
        assert_eq!(d.selected_text().unwrap(), "a = 1\nb = 2\n");
    }

    #[test]
    fn backspace_at_line_start_joins_lines() {
        let mut d = doc("ab\ncd");
        d.set_cursor(1, 0);
        assert_eq!(d.backspace(), Some(EditEvent::new(0, -1)));
        assert_eq!(d.line_text(0), "abcd");
        assert_eq!(d.cursor(), Position::new(0, 2));
    }

    #[test]
    fn multiline_paste_moves_cursor_to_end() {
        let mut d = doc("x = []");
        d.set_cursor(0, 5);
        let edit = d.insert_str("1,\n2");
        assert_eq!(edit, EditEvent::new(0, 1));
        assert_eq!(d.line_text(0), "x = [1,");
        assert_eq!(d.line_text(1), "2]");
        assert_eq!(d.cursor(), Position::new(1, 1));
    }

    #[test]
    fn typing_replaces_selection() {
        let mut d = doc("héllo\nworld");
        d.set_cursor(0, 1);
        d.move_down(1, true);
        let edit = d.insert_char('X');
        assert_eq!(edit.lines_delta, -1);
        assert_eq!(edit.lines_removed, 1);
        assert_eq!(d.line_text(0), "hXorld");
    }

    #[test]
    fn paste_over_lines_reports_what_it_removed() {
        let mut d = doc("a\nb\nc\nd");
        d.select_lines(0, 2);
        let edit = d.insert_str("x\ny\nz\n");
        assert_eq!(edit.line, 0);
        assert_eq!(edit.lines_delta, 0);
        assert_eq!(edit.lines_removed, 3);
    }

    #[test]
    fn python_detection() {
        let mut d = doc("");
        assert!(d.is_python());
        d.path = Some(PathBuf::from("notes.md"));
        assert!(!d.is_python());
        d.path = Some(PathBuf::from("tool.PY"));
        assert!(d.is_python());
        d.path = Some(PathBuf::from("script"));
        assert!(d.is_python());
    }

    #[test]
    fn save_and_reload_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("demo.py");
        let mut d = Document::open(BufferId(3), &path)?;
        d.insert_str("print('hi')\n");
        assert!(d.is_modified());
        d.save()?;
        assert_eq!(fs::read_to_string(&path)?, "print('hi')\n");
        d.reload()?;
        assert!(!d.is_modified());
        assert_eq!(d.line_count(), 2);
        assert_eq!(d.working_dir().as_deref(), Some(dir.path()));
        Ok(())
    }
}
