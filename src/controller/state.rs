//! Execution state machine with a single-flight guard.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

/// Where the controller is in handling one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecState {
    #[default]
    Idle,
    /// Searching for a complete block.
    Probing,
    /// A block compiled and is about to run.
    Resolved,
    /// The block does not compile.
    Failed,
    Running,
    Success,
    Error,
}

impl ExecState {
    /// Whether `self -> next` is a legal step.
    pub fn can_become(self, next: ExecState) -> bool {
        use ExecState::*;
        matches!(
            (self, next),
            (Idle, Probing)
                | (Probing, Resolved)
                | (Probing, Failed)
                | (Probing, Idle)
                | (Resolved, Running)
                | (Failed, Idle)
                | (Running, Success)
                | (Running, Error)
                | (Running, Idle)
                | (Success, Idle)
                | (Error, Idle)
        )
    }

    pub fn is_idle(self) -> bool {
        self == ExecState::Idle
    }

    pub fn label(self) -> &'static str {
        match self {
            ExecState::Idle => "idle",
            ExecState::Probing => "probing",
            ExecState::Resolved => "resolved",
            ExecState::Failed => "syntax error",
            ExecState::Running => "running",
            ExecState::Success => "done",
            ExecState::Error => "error",
        }
    }
}

impl std::fmt::Display for ExecState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Shared, lock-protected [`ExecState`].
#[derive(Debug, Clone, Default)]
pub struct StateCell {
    inner: Arc<Mutex<ExecState>>,
}

impl StateCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> ExecState {
        *self.lock()
    }

    /// Claim the controller: `Idle -> Probing`. False when another request is
    /// already in flight.
    pub fn try_begin(&self) -> bool {
        let mut state = self.lock();
        if state.is_idle() {
            *state = ExecState::Probing;
            true
        } else {
            false
        }
    }

    /// Move to `next`. Illegal steps are logged and applied anyway so the
    /// controller can always get back to idle.
    pub fn advance(&self, next: ExecState) {
        let mut state = self.lock();
        if !state.can_become(next) {
            warn!(from = %*state, to = %next, "unexpected execution state change");
        }
        *state = next;
    }

    fn lock(&self) -> MutexGuard<'_, ExecState> {
        // A poisoned lock still holds a valid state.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_legal() {
        use ExecState::*;
        let path = [Idle, Probing, Resolved, Running, Success, Idle];
        assert!(path.windows(2).all(|step| step[0].can_become(step[1])));
        let failed = [Idle, Probing, Failed, Idle];
        assert!(failed.windows(2).all(|step| step[0].can_become(step[1])));
    }

    #[test]
    fn shortcuts_are_illegal() {
        use ExecState::*;
        assert!(!Idle.can_become(Running));
        assert!(!Probing.can_become(Success));
        assert!(!Failed.can_become(Running));
        assert!(!Success.can_become(Probing));
    }

    #[test]
    fn single_flight() {
        let cell = StateCell::new();
        assert!(cell.try_begin());
        assert!(!cell.try_begin());
        cell.advance(ExecState::Idle);
        assert!(cell.try_begin());
    }
}
