//! `#%%` delimited cells.

use super::classify::is_cell_marker;
use super::LineRange;
use crate::editor::TextBuffer;

/// Body of the cell whose marker sits on `marker_line`: everything after the
/// marker up to the line before the next marker, trailing blank lines removed.
/// `None` when the body holds nothing but whitespace.
pub fn cell_body<B: TextBuffer + ?Sized>(buffer: &B, marker_line: usize) -> Option<LineRange> {
    let start = marker_line + 1;
    let next_marker = (start..buffer.line_count())
        .find(|&line| is_cell_marker(buffer.line_text(line)))
        .unwrap_or(buffer.line_count());
    let end = (start..next_marker)
        .rev()
        .find(|&line| !buffer.line_text(line).trim().is_empty())?;
    Some(LineRange::new(start, end))
}

/// Marker line of the cell containing `line`: the closest marker at or above
/// it. `None` when no marker precedes the line.
pub fn enclosing_marker<B: TextBuffer + ?Sized>(buffer: &B, line: usize) -> Option<usize> {
    (0..=line.min(buffer.line_count().saturating_sub(1)))
        .rev()
        .find(|&candidate| is_cell_marker(buffer.line_text(candidate)))
}

/// Cell containing `line`. Text above the first marker forms an implicit cell
/// starting at line 0.
pub fn enclosing_cell<B: TextBuffer + ?Sized>(buffer: &B, line: usize) -> Option<LineRange> {
    match enclosing_marker(buffer, line) {
        Some(marker) => cell_body(buffer, marker),
        None => {
            let next_marker = (0..buffer.line_count())
                .find(|&candidate| is_cell_marker(buffer.line_text(candidate)))
                .unwrap_or(buffer.line_count());
            let end = (0..next_marker)
                .rev()
                .find(|&candidate| !buffer.line_text(candidate).trim().is_empty())?;
            Some(LineRange::new(0, end))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::Snapshot;

    #[test]
    fn body_stops_before_next_marker() {
        let buf = Snapshot::from_text("#%% A\nprint(1)\n#%% B\nprint(2)\n");
        assert_eq!(cell_body(&buf, 0), Some(LineRange::new(1, 1)));
        assert_eq!(buf.text_range(1, 1), "print(1)");
        assert_eq!(cell_body(&buf, 2), Some(LineRange::new(3, 3)));
    }

    #[test]
    fn empty_cell_has_no_body() {
        let buf = Snapshot::from_text("# %%\n\n   \n# %%\nx = 1");
        assert_eq!(cell_body(&buf, 0), None);
    }

    #[test]
    fn enclosing_cell_from_inside() {
        let buf = Snapshot::from_text("import os\n\n#%% one\na = 1\n\nb = 2\n\n#%% two\nc = 3");
        assert_eq!(enclosing_marker(&buf, 5), Some(2));
        assert_eq!(enclosing_cell(&buf, 5), Some(LineRange::new(3, 5)));
        assert_eq!(enclosing_cell(&buf, 0), Some(LineRange::new(0, 0)));
        assert_eq!(enclosing_cell(&buf, 8), Some(LineRange::new(8, 8)));
    }
}
