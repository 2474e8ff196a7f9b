//! Terminal editor built on Ratatui: a buffer pane, a console pane and a status bar.

pub mod app;
pub mod events;
pub mod handler;
pub mod ui;

pub use handler::{run_pad, PadOptions};
