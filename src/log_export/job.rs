use chrono::{DateTime, Utc};
use serde::Serialize;

/// Numeric identifier of an export job, unique for the lifetime of the exports directory.
pub type JobId = u64;

/// Lifecycle state of an export job.
///
/// `InProgress` only ever lives in process memory. The terminal states are
/// `Completed` (finished by this process), `FileExists` (completed evidence
/// found on disk, either during recovery or by a status lookup) and `Failed`
/// (finished by this process, or a failure marker found on disk).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum JobStatus {
    InProgress,
    Completed,
    FileExists(String),
    Failed(String),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::InProgress)
    }

    /// True if an artifact is (or should be) available for download.
    pub fn is_completed(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::FileExists(_))
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::InProgress => write!(f, "In Progress"),
            JobStatus::Completed => write!(f, "Completed"),
            JobStatus::FileExists(file_name) => write!(f, "File exists: {}", file_name),
            JobStatus::Failed(reason) => write!(f, "Failed: {}", reason),
        }
    }
}

/// Point-in-time view of a registry entry, used for listings.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub status: JobStatus,
    pub updated_at: DateTime<Utc>,
}
