//! Custom event types for TUI application.

use crossterm::event::{KeyEvent, MouseEvent};

use crate::controller::ControllerEvent;
use crate::execution::OutputChunk;

/// Events that can occur in the TUI application
#[derive(Debug)]
pub enum PadEvent {
    /// User keyboard input
    Key(KeyEvent),
    /// Mouse event (scrolling, clicks)
    Mouse(MouseEvent),
    /// Bracketed paste content
    Paste(String),
    /// Progress of a triggered execution
    Controller(ControllerEvent),
    /// Output collected by the flush timer
    Output(Vec<OutputChunk>),
    /// A restart finished
    KernelRestarted(Result<(), String>),
}
