//! Terminal printer for batch runs.

use std::io::{self, Write};

use owo_colors::OwoColorize;

use crate::editor::Console;

/// Writes worker output to stdout and errors to stderr.
pub struct ConsolePrinter {
    pub color: bool,
}

impl ConsolePrinter {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// A dimmed line announcing which lines run next.
    pub fn banner(&self, text: &str) {
        if self.color {
            eprintln!("{}", text.dimmed());
        } else {
            eprintln!("{}", text);
        }
    }

    pub fn notice(&self, text: &str) {
        if self.color {
            eprintln!("{}", text.yellow());
        } else {
            eprintln!("{}", text);
        }
    }
}

impl Console for ConsolePrinter {
    fn write_output(&mut self, text: &str) {
        let mut out = io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn write_error(&mut self, text: &str) {
        let mut err = io::stderr().lock();
        let _ = if self.color {
            write!(err, "{}", text.red())
        } else {
            err.write_all(text.as_bytes())
        };
        let _ = err.flush();
    }
}
