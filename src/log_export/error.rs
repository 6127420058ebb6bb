use super::job::JobId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the log export engine.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Invalid date token: {0}")]
    InvalidDate(String),

    #[error("Invalid artifact naming: {0}")]
    InvalidNaming(String),

    #[error("Job {0} not found")]
    NotFound(JobId),

    #[error("Job {0} is still in progress")]
    InProgress(JobId),

    #[error("Job {id} failed: {reason}")]
    JobFailed { id: JobId, reason: String },

    #[error("Source log unavailable at {path:?}: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Export workers are shut down")]
    WorkersClosed,
}

impl ExportError {
    /// Errors caused by the caller's request rather than by the engine.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ExportError::InvalidDate(_)
                | ExportError::NotFound(_)
                | ExportError::InProgress(_)
                | ExportError::JobFailed { .. }
        )
    }
}
