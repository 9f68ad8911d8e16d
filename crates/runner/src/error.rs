//! Error types for job execution and run orchestration

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Error starting tests through Sauce API: {0}")]
    Submission(String),

    #[error("After trying {attempts} times with a delay of {interval_ms}ms, this job never reached 'complete' status")]
    PollTimeout { attempts: u64, interval_ms: u64 },

    #[error("Test Error: {0}")]
    TestError(String),

    #[error("Could not create tunnel to Sauce Labs: {0}")]
    TunnelStart(String),

    #[error("Job has no remote id yet: {0}")]
    NotResolved(String),

    #[error("Sauce API returned {status}: {body}")]
    Transport { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Common(#[from] saucejs_common::Error),
}

pub type RunResult<T> = Result<T, RunError>;
