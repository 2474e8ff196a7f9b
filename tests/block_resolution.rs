use pypad::block::{classify, enclosing_cell, resolve_start, CodeBlock, EndCandidates};
use pypad::editor::{Snapshot, TextBuffer};

fn ends(buffer: &Snapshot, anchor: usize) -> Vec<usize> {
    EndCandidates::new(buffer, anchor, anchor)
        .map(|candidate| candidate.end_line)
        .collect()
}

const SAMPLE: &str = "\
import os

@cache
def load(path):
    if os.path.exists(path):
        return open(path).read()
    else:
        return ''

try:
    data = load('x')
except OSError:
    data = None
finally:
    print('done')

for i in range(3):
    print(i)
";

#[test]
fn classification_is_pure() {
    for line in SAMPLE.lines() {
        assert_eq!(classify(line), classify(line));
    }
}

#[test]
fn candidates_grow_from_every_anchor() {
    let buf = Snapshot::from_text(SAMPLE);
    for anchor in 0..buf.line_count() {
        let candidates = ends(&buf, anchor);
        assert!(!candidates.is_empty(), "anchor {anchor}");
        assert!(
            candidates.windows(2).all(|pair| pair[0] < pair[1]),
            "anchor {anchor}: {candidates:?}"
        );
    }
}

#[test]
fn headers_are_never_split_from_their_suite() {
    let buf = Snapshot::from_text("x = 0\nif x:\n    x += 1\nprint(x)\n");
    assert!(resolve_start(&buf, 2, false) <= 1);
    assert!(ends(&buf, 1).iter().all(|&end| end >= 2));
}

#[test]
fn decorator_belongs_to_the_function_body() {
    let buf = Snapshot::from_text(SAMPLE);
    for body_line in 4..=7 {
        assert_eq!(resolve_start(&buf, body_line, false), 2, "from line {body_line}");
    }
}

#[test]
fn try_block_extends_through_finally_body() {
    let buf = Snapshot::from_text(SAMPLE);
    let first = EndCandidates::new(&buf, 9, 9).next().unwrap();
    assert_eq!(first.end_line, 14);
    let block = CodeBlock::from_buffer(&buf, 9, first.end_line);
    assert!(block.text.starts_with("try:"));
    assert!(block.text.ends_with("print('done')"));
}

#[test]
fn cell_never_crosses_into_the_next_one() {
    let buf = Snapshot::from_text("#%% A\nprint(1)\n#%% B\nprint(2)\n");
    let cell = enclosing_cell(&buf, 1).unwrap();
    assert_eq!(buf.text_range(cell.start, cell.end), "print(1)");
    let cell = enclosing_cell(&buf, 3).unwrap();
    assert_eq!(buf.text_range(cell.start, cell.end), "print(2)");
}
