//! Append-only log of code snippets copied out of the editor.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone};
use tracing::debug;

const RULE: &str = "--------------------------------------------------";

#[derive(Debug, Clone)]
pub struct SnippetLog {
    path: PathBuf,
}

impl SnippetLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `text` under a timestamped header.
    pub fn append(&self, text: &str) -> Result<()> {
        self.append_at(text, Local::now())
    }

    pub fn append_at<Tz: TimeZone>(&self, text: &str, when: DateTime<Tz>) -> Result<()>
    where
        Tz::Offset: std::fmt::Display,
    {
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening snippet log {}", self.path.display()))?;
        file.write_all(entry(text, &when.format("%Y-%m-%d %H:%M:%S").to_string()).as_bytes())
            .with_context(|| format!("writing snippet log {}", self.path.display()))?;
        debug!(path = %self.path.display(), "snippet logged");
        Ok(())
    }
}

fn entry(text: &str, stamp: &str) -> String {
    format!("# {RULE} {stamp} {RULE}\n\n{}\n\n", text.trim())
}
