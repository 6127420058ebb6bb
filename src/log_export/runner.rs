use super::allocator::JobIdAllocator;
use super::error::ExportError;
use super::filter::LogFilter;
use super::job::{JobId, JobStatus};
use super::naming::{failed_path, validate_date_token, ArtifactNaming};
use super::registry::JobRegistry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Everything the engine needs to know about where exports come from and go to.
#[derive(Debug, Clone)]
pub struct ExportSettings {
    /// Directory holding previously produced artifacts and receiving new ones.
    pub exports_dir: PathBuf,
    /// The append-only log that exports are filtered from.
    pub source_log: PathBuf,
    pub naming: ArtifactNaming,
    /// Maximum number of exports filtering at the same time.
    pub max_concurrent_exports: usize,
    /// Simulated processing time added to every export.
    pub processing_delay: Duration,
}

impl ExportSettings {
    pub fn new(exports_dir: impl Into<PathBuf>, source_log: impl Into<PathBuf>) -> Self {
        Self {
            exports_dir: exports_dir.into(),
            source_log: source_log.into(),
            naming: ArtifactNaming::default(),
            max_concurrent_exports: 4,
            processing_delay: Duration::ZERO,
        }
    }
}

/// Starts export jobs in the background and records their outcome.
pub struct ExportJobRunner {
    settings: ExportSettings,
    registry: Arc<JobRegistry>,
    allocator: JobIdAllocator,
    filter: Arc<LogFilter>,
    workers: Arc<Semaphore>,
    tracker: TaskTracker,
    runtime: Handle,
}

impl ExportJobRunner {
    /// Creates a runner whose exports run on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn new(settings: ExportSettings, registry: Arc<JobRegistry>) -> Self {
        let allocator = JobIdAllocator::new(settings.exports_dir.clone(), settings.naming.clone());
        let filter = Arc::new(LogFilter::new(settings.processing_delay));
        let workers = Arc::new(Semaphore::new(settings.max_concurrent_exports.max(1)));
        Self {
            settings,
            registry,
            allocator,
            filter,
            workers,
            tracker: TaskTracker::new(),
            runtime: Handle::current(),
        }
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Number of exports that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Registers a new export for `date` and starts it in the background.
    ///
    /// The returned id is already registered as in progress. This never waits
    /// for the export itself, so it can be called from async and blocking
    /// contexts alike.
    ///
    /// Allocating the id scans the exports directory while holding the
    /// allocation lock, so this does a short amount of blocking file system
    /// work on the calling thread. Concurrent submissions queue on that lock.
    pub fn submit(&self, date: &str) -> Result<JobId, ExportError> {
        validate_date_token(date)?;
        if self.tracker.is_closed() {
            return Err(ExportError::WorkersClosed);
        }

        let id = self.allocator.allocate(&self.registry);
        let file_name = self.settings.naming.file_name(id, date);
        info!("Submitted export job {} for date '{}' -> {}", id, date, file_name);

        let task = ExportTask {
            id,
            source: self.settings.source_log.clone(),
            target: self.settings.exports_dir.join(file_name),
            date: date.to_string(),
            filter: Arc::clone(&self.filter),
            registry: Arc::clone(&self.registry),
            workers: Arc::clone(&self.workers),
        };
        self.tracker.spawn_on(task.run(), &self.runtime);

        Ok(id)
    }

    /// Stops accepting submissions and waits for running exports to finish.
    ///
    /// The worker pool is closed afterwards. A submission racing with the
    /// shutdown that still gets spawned fails with [`ExportError::WorkersClosed`]
    /// instead of running.
    pub async fn shutdown(&self) {
        self.tracker.close();
        if !self.tracker.is_empty() {
            info!("Waiting for {} export jobs to finish...", self.tracker.len());
        }
        self.tracker.wait().await;
        self.workers.close();
    }
}

struct ExportTask {
    id: JobId,
    source: PathBuf,
    target: PathBuf,
    date: String,
    filter: Arc<LogFilter>,
    registry: Arc<JobRegistry>,
    workers: Arc<Semaphore>,
}

impl ExportTask {
    async fn run(self) {
        let id = self.id;
        let registry = Arc::clone(&self.registry);
        let target = self.target.clone();

        let status = self.execute().await;
        if let JobStatus::Failed(reason) = &status {
            record_failure(id, &target, reason).await;
        }
        registry.finish(id, status);
    }

    async fn execute(self) -> JobStatus {
        let id = self.id;
        let _permit = match self.workers.acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                error!("Export job {} could not start: worker pool is closed", id);
                return JobStatus::Failed(ExportError::WorkersClosed.to_string());
            }
        };
        debug!("Export job {} acquired a worker", id);

        let start_time = Instant::now();
        let filter = self.filter;
        let (source, target, date) = (self.source, self.target, self.date);
        let result = tokio::task::spawn_blocking(move || filter.run(&source, &target, &date)).await;
        let elapsed = start_time.elapsed();

        match result {
            Ok(Ok(report)) => {
                info!(
                    "Export job {} completed in {:?} ({} of {} lines)",
                    id, elapsed, report.lines_matched, report.lines_scanned
                );
                JobStatus::Completed
            }
            Ok(Err(e)) => {
                error!("Export job {} failed after {:?}: {}", id, elapsed, e);
                JobStatus::Failed(e.to_string())
            }
            Err(e) => {
                error!("Export job {} panicked after {:?}: {}", id, elapsed, e);
                JobStatus::Failed(format!("Task panic: {}", e))
            }
        }
    }
}

/// Leaves a marker next to the would-be artifact so the failed job keeps its
/// id, and its status, after a restart.
async fn record_failure(id: JobId, target: &Path, reason: &str) {
    let marker = failed_path(target);
    if let Err(e) = tokio::fs::write(&marker, reason).await {
        warn!(
            "Could not record failure of export job {} at {:?}: {}",
            id, marker, e
        );
    }
}
