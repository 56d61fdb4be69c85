//! Error types for the run orchestrator

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Playwright not found. Install with: npm i -D @playwright/test && npx playwright install")]
    PlaywrightNotFound,

    #[error("Failed to spawn {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("Runner timed out after {0} ms")]
    Timeout(u64),

    #[error("Report parse error: {0}")]
    Report(String),

    #[error("Invalid run request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] testdeck_common::Error),
}

pub type RunnerResult<T> = Result<T, RunnerError>;

impl From<RunnerError> for testdeck_common::Error {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::Store(inner) => inner,
            RunnerError::InvalidRequest(msg) => testdeck_common::Error::Validation(msg),
            RunnerError::Io(e) => testdeck_common::Error::Io(e),
            other => testdeck_common::Error::Runner(other.to_string()),
        }
    }
}
