use super::job::{JobId, JobSnapshot, JobStatus};
use super::naming::{read_failure_reason, ArtifactNaming};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

const SHARD_COUNT: usize = 16;

#[derive(Debug, Clone)]
struct JobEntry {
    status: JobStatus,
    updated_at: DateTime<Utc>,
}

impl JobEntry {
    fn new(status: JobStatus) -> Self {
        Self {
            status,
            updated_at: Utc::now(),
        }
    }
}

type Shard = RwLock<HashMap<JobId, JobEntry>>;

/// Concurrent map from job id to status, shared by every export task.
///
/// Entries are spread over a fixed set of lock-protected shards so that
/// unrelated jobs do not contend on the same lock.
pub struct JobRegistry {
    shards: Vec<Shard>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT)
                .map(|_| RwLock::new(HashMap::new()))
                .collect(),
        }
    }

    fn shard(&self, id: JobId) -> &Shard {
        &self.shards[(id % SHARD_COUNT as u64) as usize]
    }

    // The shards hold plain maps that are never left half-updated, so a
    // poisoned lock still guards consistent data.
    fn read(shard: &Shard) -> RwLockReadGuard<'_, HashMap<JobId, JobEntry>> {
        shard.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(shard: &Shard) -> RwLockWriteGuard<'_, HashMap<JobId, JobEntry>> {
        shard.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Unconditionally records `status` for `id`.
    pub fn set(&self, id: JobId, status: JobStatus) {
        Self::write(self.shard(id)).insert(id, JobEntry::new(status));
    }

    pub fn get(&self, id: JobId) -> Option<JobStatus> {
        Self::read(self.shard(id))
            .get(&id)
            .map(|entry| entry.status.clone())
    }

    /// Moves an in-progress job to a terminal state.
    ///
    /// Returns false, leaving the entry untouched, if the job is unknown or
    /// already terminal.
    pub fn finish(&self, id: JobId, status: JobStatus) -> bool {
        debug_assert!(status.is_terminal());
        let mut shard = Self::write(self.shard(id));
        match shard.get_mut(&id) {
            Some(entry) if entry.status == JobStatus::InProgress => {
                *entry = JobEntry::new(status);
                true
            }
            Some(entry) => {
                warn!(
                    "Ignoring transition of job {} from terminal state '{}' to '{}'",
                    id, entry.status, status
                );
                false
            }
            None => {
                warn!("Ignoring transition of unknown job {} to '{}'", id, status);
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| Self::read(s).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest id currently known, if any.
    pub fn max_id(&self) -> Option<JobId> {
        self.shards
            .iter()
            .filter_map(|s| Self::read(s).keys().max().copied())
            .max()
    }

    /// All entries, sorted by id.
    pub fn snapshot(&self) -> Vec<JobSnapshot> {
        let mut jobs: Vec<JobSnapshot> = self
            .shards
            .iter()
            .flat_map(|s| {
                Self::read(s)
                    .iter()
                    .map(|(id, entry)| JobSnapshot {
                        id: *id,
                        status: entry.status.clone(),
                        updated_at: entry.updated_at,
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        jobs.sort_by_key(|job| job.id);
        jobs
    }

    /// Seeds the registry from artifacts and failure markers already present
    /// in `exports_dir`.
    ///
    /// Every artifact becomes a `FileExists` entry and every failure marker a
    /// `Failed` entry, unless the id is already known, so running it again
    /// never changes the outcome. Returns the number of jobs found.
    pub fn recover(&self, exports_dir: &Path, naming: &ArtifactNaming) -> usize {
        let entries = match std::fs::read_dir(exports_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Could not scan {:?} for previous exports: {}", exports_dir, e);
                return 0;
            }
        };

        let mut found = 0;
        for entry in entries.flatten() {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let (id, status) = if let Some(id) = naming.parse_artifact_id(&file_name) {
                (id, JobStatus::FileExists(file_name.clone()))
            } else if let Some(id) = naming.parse_failed_id(&file_name) {
                (id, JobStatus::Failed(read_failure_reason(&entry.path())))
            } else {
                continue;
            };
            found += 1;
            Self::write(self.shard(id))
                .entry(id)
                .or_insert_with(|| JobEntry::new(status));
            debug!("Recovered export job {} from {}", id, file_name);
        }

        info!("Recovered {} export jobs from {:?}", found, exports_dir);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn set_and_get() {
        let registry = JobRegistry::new();
        assert!(registry.get(1).is_none());

        registry.set(1, JobStatus::InProgress);
        registry.set(17, JobStatus::Completed);

        assert_eq!(registry.get(1), Some(JobStatus::InProgress));
        assert_eq!(registry.get(17), Some(JobStatus::Completed));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.max_id(), Some(17));
    }

    #[test]
    fn finish_only_moves_in_progress_jobs() {
        let registry = JobRegistry::new();
        registry.set(1, JobStatus::InProgress);

        assert!(registry.finish(1, JobStatus::Failed("boom".to_string())));
        assert!(!registry.finish(1, JobStatus::Completed));
        assert_eq!(registry.get(1), Some(JobStatus::Failed("boom".to_string())));

        assert!(!registry.finish(2, JobStatus::Completed));
        assert!(registry.get(2).is_none());
    }

    #[test]
    fn snapshot_is_sorted() {
        let registry = JobRegistry::new();
        for id in [40, 3, 21, 1] {
            registry.set(id, JobStatus::Completed);
        }
        let ids: Vec<JobId> = registry.snapshot().iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![1, 3, 21, 40]);
    }

    #[test]
    fn recover_seeds_file_exists_entries() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.log"), "source").unwrap();
        fs::write(dir.path().join("app.log.1.2024-01-01.log"), "").unwrap();
        fs::write(dir.path().join("app.log.4.2024-01-02.log"), "").unwrap();
        fs::write(dir.path().join("app.log.5.2024-01-02.log.part"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let registry = JobRegistry::new();
        let found = registry.recover(dir.path(), &ArtifactNaming::default());

        assert_eq!(found, 2);
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.get(4),
            Some(JobStatus::FileExists("app.log.4.2024-01-02.log".to_string()))
        );
        assert!(registry.get(5).is_none());
    }

    #[test]
    fn recover_seeds_failed_entries_from_markers() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.log.1.d.log"), "").unwrap();
        fs::write(dir.path().join("app.log.2.d.log.failed"), "Source log unavailable").unwrap();

        let registry = JobRegistry::new();
        let found = registry.recover(dir.path(), &ArtifactNaming::default());

        assert_eq!(found, 2);
        assert_eq!(
            registry.get(2),
            Some(JobStatus::Failed("Source log unavailable".to_string()))
        );
        assert_eq!(registry.max_id(), Some(2));
    }

    #[test]
    fn recover_is_idempotent_and_keeps_existing_entries() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.log.1.d.log"), "").unwrap();
        fs::write(dir.path().join("app.log.2.d.log"), "").unwrap();

        let registry = JobRegistry::new();
        registry.set(2, JobStatus::Completed);

        let naming = ArtifactNaming::default();
        registry.recover(dir.path(), &naming);
        let first = registry.snapshot();
        registry.recover(dir.path(), &naming);
        let second = registry.snapshot();

        assert_eq!(first.len(), 2);
        assert_eq!(
            first.iter().map(|j| (j.id, j.status.clone())).collect::<Vec<_>>(),
            second.iter().map(|j| (j.id, j.status.clone())).collect::<Vec<_>>()
        );
        assert_eq!(registry.get(2), Some(JobStatus::Completed));
    }

    #[test]
    fn recover_missing_dir_finds_nothing() {
        let dir = TempDir::new().unwrap();
        let registry = JobRegistry::new();
        let found = registry.recover(&dir.path().join("missing"), &ArtifactNaming::default());
        assert_eq!(found, 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn concurrent_writers_do_not_lose_entries() {
        let registry = Arc::new(JobRegistry::new());
        let handles: Vec<_> = (0..8u64)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..100u64 {
                        let id = t * 100 + i + 1;
                        registry.set(id, JobStatus::InProgress);
                        registry.finish(id, JobStatus::Completed);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 800);
        assert!(registry
            .snapshot()
            .iter()
            .all(|j| j.status == JobStatus::Completed));
    }
}
