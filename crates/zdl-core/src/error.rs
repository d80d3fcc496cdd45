//! Error taxonomy for queue operations and the fetcher boundary.
//!
//! Per-task failures are recorded as data in the task's progress record;
//! these types are what queue-level operations return to their caller.

use thiserror::Error;

/// Stable tag for a [`QueueError`], useful for callers that branch on the
/// failure class rather than the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DependencyMissing,
    InvalidInput,
    ProbeFailure,
    ExecutionFailure,
    ArtifactMissing,
    Timeout,
    InvalidState,
    NotFound,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("{0}")]
    DependencyMissing(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("metadata probe failed: {0}")]
    ProbeFailure(String),

    #[error("{0}")]
    ExecutionFailure(String),

    #[error("output file not found")]
    ArtifactMissing,

    #[error("{0} timed out")]
    Timeout(String),

    #[error("task {id} is {state}; operation not permitted")]
    InvalidState { id: String, state: String },

    #[error("task not found: {0}")]
    NotFound(String),
}

impl QueueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DependencyMissing(_) => ErrorKind::DependencyMissing,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::ProbeFailure(_) => ErrorKind::ProbeFailure,
            Self::ExecutionFailure(_) => ErrorKind::ExecutionFailure,
            Self::ArtifactMissing => ErrorKind::ArtifactMissing,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::NotFound(_) => ErrorKind::NotFound,
        }
    }
}

/// Failure at the fetcher collaborator boundary (process spawn, I/O, decode).
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on fetcher {stream}: {source}")]
    Io {
        stream: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("fetcher timed out after {0}s")]
    Timeout(u64),

    #[error("fetcher exited with code {code}: {message}")]
    Exit { code: i32, message: String },

    #[error("failed to parse fetcher output: {0}")]
    Parse(String),

    #[error("{0} is not installed")]
    Missing(String),
}

impl From<FetchError> for QueueError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Timeout(_) => QueueError::Timeout("metadata probe".to_string()),
            FetchError::Missing(p) => QueueError::DependencyMissing(format!("{p} is not installed")),
            FetchError::Parse(m) => QueueError::ProbeFailure(m),
            FetchError::Exit { message, .. } => QueueError::ProbeFailure(message),
            other => QueueError::ExecutionFailure(other.to_string()),
        }
    }
}
