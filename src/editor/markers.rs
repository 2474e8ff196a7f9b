//! Execution-state markers painted over line ranges.

use std::collections::HashMap;

use super::{BufferId, EditEvent};
use crate::block::LineRange;

/// Execution state shown beside a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerState {
    /// Queued or running.
    Active,
    Error,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub buffer: BufferId,
    pub lines: LineRange,
    pub state: MarkerState,
}

/// At most one marker per buffer. Owned by the task that owns the buffers.
#[derive(Debug, Default)]
pub struct MarkerBook {
    markers: HashMap<BufferId, Marker>,
}

impl MarkerBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever marker `buffer` had.
    pub fn paint(&mut self, buffer: BufferId, lines: LineRange, state: MarkerState) {
        self.markers.insert(buffer, Marker { buffer, lines, state });
    }

    /// Change the state of the existing marker, keeping its lines.
    pub fn restate(&mut self, buffer: BufferId, state: MarkerState) -> bool {
        match self.markers.get_mut(&buffer) {
            Some(marker) => {
                marker.state = state;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self, buffer: BufferId) {
        self.markers.remove(&buffer);
    }

    pub fn get(&self, buffer: BufferId) -> Option<&Marker> {
        self.markers.get(&buffer)
    }

    /// Marker state covering `line`, if any.
    pub fn state_at(&self, buffer: BufferId, line: usize) -> Option<MarkerState> {
        self.markers
            .get(&buffer)
            .filter(|marker| marker.lines.contains(line))
            .map(|marker| marker.state)
    }

    /// Keep markers in step with an edit.
    ///
    /// Edits above a marker move it. An edit that touches a marked line removes
    /// the marker, unless an execution is running, in which case the marker
    /// stays and is shown as active.
    pub fn on_edit(&mut self, buffer: BufferId, edit: EditEvent, running: bool) {
        let Some(marker) = self.markers.get_mut(&buffer) else {
            return;
        };
        let touched = LineRange::new(edit.line, edit.line + edit.lines_removed);
        let overlaps = touched.start <= marker.lines.end && marker.lines.start <= touched.end;

        if overlaps {
            if !running {
                self.markers.remove(&buffer);
                return;
            }
            marker.state = MarkerState::Active;
            marker.lines.end = shift(marker.lines.end, edit.lines_delta).max(marker.lines.start);
        } else if edit.line < marker.lines.start {
            marker.lines.start = shift(marker.lines.start, edit.lines_delta);
            marker.lines.end = shift(marker.lines.end, edit.lines_delta);
        }
    }
}

fn shift(line: usize, delta: isize) -> usize {
    line.saturating_add_signed(delta)
}
