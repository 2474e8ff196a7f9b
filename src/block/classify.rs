//! Prefix rules for a single source line.
//!
//! Classification never tokenizes. It only looks at how a line starts and
//! ends, which is enough to propose block boundaries that the compiler then
//! confirms.

/// What a single line tells the boundary resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineClass {
    pub is_blank: bool,
    /// First non-whitespace character is `#`.
    pub is_comment: bool,
    pub is_code: bool,
    /// Code line starting with a space or tab.
    pub starts_with_indent: bool,
    pub is_decorator: bool,
    /// `else`, `elif`, `except` or `finally` clause at column 0.
    pub is_continuation: bool,
    /// `elif` or `except`: a clause that may itself be followed by more clauses.
    pub is_chained_clause: bool,
    /// `if`, `for` or `while` header, or any other line ending in `:`.
    pub is_header: bool,
    /// `def`, `async def` or `class`, which may carry decorators above.
    pub is_definition: bool,
    /// Code line ending in a `\` line continuation.
    pub continues_line: bool,
}

impl LineClass {
    /// The line cannot stand alone without something above it.
    pub fn requires_prior_line(&self) -> bool {
        self.starts_with_indent || self.is_continuation
    }

    /// The line opens something that needs at least one more line below.
    pub fn requires_following_line(&self) -> bool {
        self.is_header || self.is_chained_clause || self.is_decorator || self.continues_line
    }
}

/// Classify one line of text.
pub fn classify(line: &str) -> LineClass {
    let line = line.trim_end();
    let stripped = line.trim_start();

    if stripped.is_empty() {
        return LineClass {
            is_blank: true,
            ..LineClass::default()
        };
    }
    if stripped.starts_with('#') {
        return LineClass {
            is_comment: true,
            ..LineClass::default()
        };
    }

    let is_chained_clause = starts_with_keyword(line, "elif") || starts_with_keyword(line, "except");
    let is_continuation =
        is_chained_clause || starts_with_keyword(line, "else") || starts_with_keyword(line, "finally");
    LineClass {
        is_code: true,
        starts_with_indent: line.starts_with([' ', '\t']),
        is_decorator: line.starts_with('@'),
        is_continuation,
        is_chained_clause,
        is_header: !is_continuation
            && (line.ends_with(':')
                || ["if", "for", "while"]
                    .iter()
                    .any(|keyword| starts_with_keyword(line, keyword))),
        is_definition: starts_with_keyword(line, "def")
            || starts_with_keyword(line, "class")
            || line
                .strip_prefix("async")
                .is_some_and(|rest| rest.starts_with([' ', '\t']) && starts_with_keyword(rest.trim_start(), "def")),
        continues_line: line.ends_with('\\'),
        ..LineClass::default()
    }
}

/// True for a `#%%` or `# %%` cell marker line.
pub fn is_cell_marker(line: &str) -> bool {
    line.starts_with("#%%") || line.starts_with("# %%")
}

/// `line` begins with `keyword` followed by a character that cannot continue
/// an identifier.
fn starts_with_keyword(line: &str, keyword: &str) -> bool {
    match line.strip_prefix(keyword) {
        Some(rest) => rest
            .chars()
            .next()
            .map_or(true, |c| matches!(c, ':' | ' ' | '\t' | '(' | '[' | '\\')),
        None => false,
    }
}
