//! Operations offered to the outside world: create an export, query its
//! status and fetch the produced file.

use super::error::ExportError;
use super::job::{JobId, JobSnapshot, JobStatus};
use super::registry::JobRegistry;
use super::resolver::StatusResolver;
use super::runner::{ExportJobRunner, ExportSettings};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// A finished export, ready to be handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub job_id: JobId,
    pub file_name: String,
    pub path: PathBuf,
}

impl ExportArtifact {
    /// File name suggested to whoever downloads the artifact.
    pub fn download_name(&self) -> String {
        format!("logfile_{}.log", self.job_id)
    }

    pub async fn read(&self) -> Result<Vec<u8>, ExportError> {
        Ok(tokio::fs::read(&self.path).await?)
    }
}

/// Owns the registry, the runner and the resolver of one exports directory.
pub struct LogExportService {
    registry: Arc<JobRegistry>,
    runner: ExportJobRunner,
    resolver: StatusResolver,
}

impl LogExportService {
    /// Opens the service and recovers jobs finished by previous runs.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn open(settings: ExportSettings) -> Self {
        let registry = Arc::new(JobRegistry::new());
        let recovered = registry.recover(&settings.exports_dir, &settings.naming);
        info!(
            "Log export service ready on {:?} ({} previous exports, {} workers)",
            settings.exports_dir, recovered, settings.max_concurrent_exports
        );

        let resolver = StatusResolver::new(
            Arc::clone(&registry),
            settings.exports_dir.clone(),
            settings.naming.clone(),
        );
        let runner = ExportJobRunner::new(settings, Arc::clone(&registry));
        Self {
            registry,
            runner,
            resolver,
        }
    }

    pub fn exports_dir(&self) -> &Path {
        &self.runner.settings().exports_dir
    }

    pub fn source_log(&self) -> &Path {
        &self.runner.settings().source_log
    }

    pub fn in_flight(&self) -> usize {
        self.runner.in_flight()
    }

    /// Starts a new export of the lines containing `date`.
    ///
    /// Returns once the job id is registered. Picking the id lists the
    /// exports directory under a lock, which briefly blocks the calling
    /// thread. From async code with many concurrent callers, consider running
    /// this through `tokio::task::spawn_blocking`.
    pub fn create(&self, date: &str) -> Result<JobId, ExportError> {
        self.runner.submit(date)
    }

    pub fn status(&self, id: JobId) -> Result<JobStatus, ExportError> {
        self.resolver.resolve(id).ok_or(ExportError::NotFound(id))
    }

    /// Locates the artifact of a completed job.
    ///
    /// The status is checked first so that a running or failed job is never
    /// served, even if a file with its id happens to exist.
    pub fn download(&self, id: JobId) -> Result<ExportArtifact, ExportError> {
        match self.status(id)? {
            JobStatus::InProgress => Err(ExportError::InProgress(id)),
            JobStatus::Failed(reason) => Err(ExportError::JobFailed { id, reason }),
            JobStatus::Completed | JobStatus::FileExists(_) => {
                let path = self
                    .resolver
                    .find_artifact(id)
                    .ok_or(ExportError::NotFound(id))?;
                let file_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Ok(ExportArtifact {
                    job_id: id,
                    file_name,
                    path,
                })
            }
        }
    }

    /// Jobs known to this process, sorted by id.
    pub fn jobs(&self) -> Vec<JobSnapshot> {
        self.registry.snapshot()
    }

    /// Polls the status of `id` until it reaches a terminal state.
    pub async fn wait_until_terminal(
        &self,
        id: JobId,
        poll_interval: Duration,
    ) -> Result<JobStatus, ExportError> {
        loop {
            let status = self.status(id)?;
            if status.is_terminal() {
                return Ok(status);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Refuses new exports and waits for the running ones to finish.
    pub async fn shutdown(&self) {
        self.runner.shutdown().await;
    }
}
