//! Worker channel errors.

use std::time::Duration;

use thiserror::Error;

/// Why a call to the Python worker produced no answer.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Python kernel not responding; restart it to continue")]
    NotAlive,

    #[error("no answer from the Python kernel within {0:?}")]
    Timeout(Duration),

    #[error("the Python kernel went away before answering")]
    NoAnswer,

    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("worker I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed worker message: {0}")]
    Protocol(String),

    #[error("worker rejected the request: {0}")]
    Worker(String),
}

impl WorkerError {
    /// The worker can no longer be trusted and needs a restart.
    pub fn is_liveness_failure(&self) -> bool {
        matches!(
            self,
            WorkerError::NotAlive | WorkerError::NoAnswer | WorkerError::Io(_) | WorkerError::Spawn { .. }
        )
    }
}

impl From<serde_json::Error> for WorkerError {
    fn from(err: serde_json::Error) -> Self {
        WorkerError::Protocol(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;
