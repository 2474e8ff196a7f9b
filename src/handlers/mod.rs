//! Entry points behind the command line: the interactive editor and batch runs.

pub mod pad;
pub mod run;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::config::Config;
use crate::editor::{BufferId, Document};
use crate::process::InterpreterSpec;

/// The interpreter to start, as configured.
pub fn interpreter(cfg: &Config) -> InterpreterSpec {
    InterpreterSpec::new(cfg.python()).with_figure_events(cfg.matplotlib_events())
}

/// Open `paths` as buffers with ids 1, 2, ...
pub fn open_documents(paths: &[PathBuf]) -> Result<Vec<Document>> {
    paths
        .iter()
        .zip(1..)
        .map(|(path, id)| Document::open(BufferId(id), path).with_context(|| format!("opening {}", path.display())))
        .collect()
}

/// The first buffer, which must exist and hold Python.
pub fn python_document(docs: Vec<Document>) -> Result<Document> {
    let Some(doc) = docs.into_iter().next() else {
        bail!("no file given");
    };
    if !doc.is_python() {
        bail!("{} is not a Python buffer", doc.name());
    }
    Ok(doc)
}
