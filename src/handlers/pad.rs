//! Interactive editor mode.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use is_terminal::IsTerminal;
use std::io;
use tracing::info;

use crate::config::Config;
use crate::execution::WorkerChannel;
use crate::tui::{run_pad, PadOptions};

/// Open `files` in the editor with a fresh Python worker.
pub async fn run(cfg: &Config, files: &[PathBuf], in_place: bool) -> Result<()> {
    // Check if TUI mode is available
    if !io::stdout().is_terminal() {
        eprintln!("The editor needs a terminal. Use --line, --cell or --all to run without one.");
        return Err(anyhow!("stdout is not a terminal"));
    }

    let docs = super::open_documents(files)?;
    let spec = super::interpreter(cfg);
    info!(python = %spec.program, files = docs.len(), "starting editor");
    let channel = WorkerChannel::spawn(spec, cfg.compile_timeout()).await?;

    let mut options = PadOptions::from_config(cfg);
    if in_place {
        options.advance_cursor = false;
    }
    run_pad(docs, channel, options).await
}
