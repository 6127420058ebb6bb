use super::job::{JobId, JobStatus};
use super::naming::{read_failure_reason, ArtifactNaming};
use super::registry::JobRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Answers status queries, falling back to the exports directory for jobs
/// that the registry does not know about.
///
/// On disk, a finished artifact means the job completed and a failure marker
/// means it failed.
pub struct StatusResolver {
    registry: Arc<JobRegistry>,
    exports_dir: PathBuf,
    naming: ArtifactNaming,
}

impl StatusResolver {
    pub fn new(
        registry: Arc<JobRegistry>,
        exports_dir: impl Into<PathBuf>,
        naming: ArtifactNaming,
    ) -> Self {
        Self {
            registry,
            exports_dir: exports_dir.into(),
            naming,
        }
    }

    /// Current status of `id`, or `None` if there is no trace of the job.
    pub fn resolve(&self, id: JobId) -> Option<JobStatus> {
        if let Some(status) = self.registry.get(id) {
            return Some(status);
        }
        let entries = match std::fs::read_dir(&self.exports_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Could not scan {:?} for job {}: {}", self.exports_dir, id, e);
                return None;
            }
        };
        let status = entries.flatten().find_map(|entry| {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if self.naming.parse_artifact_id(&file_name) == Some(id) {
                Some(JobStatus::FileExists(file_name))
            } else if self.naming.parse_failed_id(&file_name) == Some(id) {
                Some(JobStatus::Failed(read_failure_reason(&entry.path())))
            } else {
                None
            }
        });
        debug!("Job {} on disk: {:?}", id, status);
        status
    }

    /// Path of the fully written artifact of `id`, if there is one.
    pub fn find_artifact(&self, id: JobId) -> Option<PathBuf> {
        let entries = match std::fs::read_dir(&self.exports_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Could not scan {:?} for job {}: {}", self.exports_dir, id, e);
                return None;
            }
        };
        let found = entries.flatten().find(|entry| {
            self.naming
                .parse_artifact_id(&entry.file_name().to_string_lossy())
                == Some(id)
        });
        debug!(
            "Looked up artifact of job {} in {:?}: {:?}",
            id,
            self.exports_dir,
            found.as_ref().map(|e| e.file_name())
        );
        found.map(|entry| entry.path())
    }
}
