//! Upward and downward boundary search around an anchor line.
//!
//! [`resolve_start`] walks up until the block cannot need anything further
//! above. [`EndCandidates`] walks down lazily and yields every line where the
//! text so far looks complete; the caller asks the compiler about each one and
//! only pulls the next candidate when the answer is "needs more input".

use super::classify::classify;
use crate::editor::TextBuffer;

/// First line of the block containing `anchor`.
///
/// `expect_more_above` is set when the caller already knows the anchor is a
/// continuation of something earlier (for example the first code line below it
/// is indented).
pub fn resolve_start<B: TextBuffer + ?Sized>(buffer: &B, anchor: usize, expect_more_above: bool) -> usize {
    if buffer.line_count() == 0 {
        return 0;
    }
    let anchor = anchor.min(buffer.line_count() - 1);
    let mut first = anchor;
    let mut need_more = expect_more_above;
    let mut satisfied = false;
    // A definition or decorator was reached: decorators above it belong to the
    // block even across blank and comment lines.
    let mut decorated = false;

    for line in (0..=anchor).rev() {
        let class = classify(buffer.line_text(line));
        if satisfied {
            if class.is_decorator {
                first = line;
                decorated = true;
                continue;
            }
            if decorated && !class.is_code {
                continue;
            }
            break;
        }
        let requires_prior = class.requires_prior_line();
        need_more = need_more || requires_prior || class.is_definition;
        if !need_more && !class.is_decorator {
            break;
        }
        if class.is_code {
            first = line;
            if !requires_prior {
                need_more = false;
                satisfied = true;
                decorated = class.is_definition || class.is_decorator;
            }
        }
    }
    first
}

/// One proposed end of the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndCandidate {
    /// First code line seen while scanning down, if any.
    pub first_code_line: Option<usize>,
    /// Last line of the proposed block.
    pub end_line: usize,
    /// No code was found between the anchor and this point.
    pub is_empty: bool,
    /// The first code line below the anchor was indented, so the start must be
    /// searched above it.
    pub needs_more_above: bool,
}

/// Lazy sequence of strictly increasing end lines.
///
/// The last item is always produced at the end of the scanned range, even if
/// no line there looked complete, so the caller has a final block to fall back
/// on.
#[derive(Debug)]
pub struct EndCandidates<'a, B: ?Sized> {
    buffer: &'a B,
    line: usize,
    min_line: usize,
    /// Exclusive upper bound of the scan.
    limit: usize,
    last_code_line: usize,
    first_code_line: Option<usize>,
    expect_more_below: bool,
    is_first_code_line: bool,
    is_empty: bool,
    needs_more_above: bool,
    last_yielded: Option<usize>,
    done: bool,
}

impl<'a, B: TextBuffer + ?Sized> EndCandidates<'a, B> {
    /// Scan from `anchor` to the end of the buffer. Candidates before
    /// `min_line` are skipped, so a selection is never truncated.
    pub fn new(buffer: &'a B, anchor: usize, min_line: usize) -> Self {
        Self::bounded(buffer, anchor, min_line, buffer.line_count())
    }

    /// Like [`EndCandidates::new`] with the scan stopping before `limit`.
    pub fn bounded(buffer: &'a B, anchor: usize, min_line: usize, limit: usize) -> Self {
        Self {
            buffer,
            line: anchor,
            min_line,
            limit: limit.min(buffer.line_count()),
            last_code_line: anchor,
            first_code_line: None,
            expect_more_below: false,
            is_first_code_line: true,
            is_empty: true,
            needs_more_above: false,
            last_yielded: None,
            done: false,
        }
    }

    fn candidate(&self) -> EndCandidate {
        EndCandidate {
            first_code_line: self.first_code_line,
            end_line: self.last_code_line,
            is_empty: self.is_empty,
            needs_more_above: self.needs_more_above,
        }
    }

    /// Consume one line. Returns a candidate when the block looks complete here.
    fn step(&mut self) -> Option<EndCandidate> {
        let line = self.line;
        self.line += 1;

        let class = classify(self.buffer.line_text(line));
        let indented = class.starts_with_indent;
        let might_need_more = (class.is_chained_clause || self.is_first_code_line && class.is_header)
            && !self.expect_more_below;

        if class.is_continuation || indented || might_need_more {
            self.expect_more_below = true;
        }
        if self.is_empty && indented {
            self.needs_more_above = true;
        }
        if class.is_code {
            self.is_empty = false;
            if !class.is_continuation && !might_need_more {
                self.expect_more_below = false;
            }
            self.first_code_line.get_or_insert(line);
            if class.is_continuation || line <= self.min_line {
                self.last_code_line = line;
            }
            if class.continues_line || class.is_decorator {
                self.expect_more_below = true;
            }
        }

        let satisfied = class.is_code && !indented && !self.expect_more_below;
        let candidate = (line >= self.min_line && satisfied).then(|| self.candidate());
        if class.is_code {
            self.last_code_line = line;
            self.is_first_code_line = false;
        }
        candidate
    }

    fn accept(&mut self, candidate: EndCandidate) -> Option<EndCandidate> {
        match self.last_yielded {
            Some(previous) if candidate.end_line <= previous => None,
            _ => {
                self.last_yielded = Some(candidate.end_line);
                Some(candidate)
            }
        }
    }
}

impl<B: TextBuffer + ?Sized> Iterator for EndCandidates<'_, B> {
    type Item = EndCandidate;

    fn next(&mut self) -> Option<EndCandidate> {
        while !self.done {
            if self.line >= self.limit {
                self.done = true;
                let last = self.candidate();
                return self.accept(last);
            }
            if let Some(candidate) = self.step() {
                if let Some(candidate) = self.accept(candidate) {
                    return Some(candidate);
                }
            }
        }
        None
    }
}
