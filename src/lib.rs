//! Run Python source statement by statement against one long-lived interpreter.
//!
//! [`block`] finds statement boundaries, [`execution`] talks to the Python
//! worker, and [`controller`] ties the two together for an editor.

pub mod block;
pub mod cli;
pub mod config;
pub mod controller;
pub mod editor;
pub mod error;
pub mod execution;
pub mod handlers;
pub mod logging;
pub mod printer;
pub mod process;
pub mod snippets;
pub mod tui;
pub mod utils;

pub use error::{Result, WorkerError};
