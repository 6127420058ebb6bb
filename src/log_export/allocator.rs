use super::job::{JobId, JobStatus};
use super::naming::ArtifactNaming;
use super::registry::JobRegistry;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Hands out job ids that are unused both on disk and in memory.
pub struct JobIdAllocator {
    exports_dir: PathBuf,
    naming: ArtifactNaming,
    /// Serializes the directory scan with the reservation of the new id.
    allocation_lock: Mutex<()>,
}

impl JobIdAllocator {
    pub fn new(exports_dir: impl Into<PathBuf>, naming: ArtifactNaming) -> Self {
        Self {
            exports_dir: exports_dir.into(),
            naming,
            allocation_lock: Mutex::new(()),
        }
    }

    pub fn exports_dir(&self) -> &Path {
        &self.exports_dir
    }

    /// One past the highest id found in the exports directory, or 1 if the
    /// directory is empty, missing or unreadable.
    ///
    /// Not safe to use for allocation on its own, see [`Self::allocate`].
    pub fn next_id(&self) -> JobId {
        self.max_id_on_disk().unwrap_or(0) + 1
    }

    fn max_id_on_disk(&self) -> Option<JobId> {
        let entries = match std::fs::read_dir(&self.exports_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Could not list {:?}: {}", self.exports_dir, e);
                return None;
            }
        };
        entries
            .flatten()
            .filter_map(|entry| self.naming.parse_id(&entry.file_name().to_string_lossy()))
            .max()
    }

    /// Allocates a fresh id and registers it as in progress before releasing
    /// the allocation lock, so concurrent callers never get the same id.
    ///
    /// The directory scan runs while the lock is held and blocks the caller.
    pub fn allocate(&self, registry: &JobRegistry) -> JobId {
        let _guard = self
            .allocation_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let on_disk = self.max_id_on_disk().unwrap_or(0);
        let in_memory = registry.max_id().unwrap_or(0);
        let id = on_disk.max(in_memory) + 1;
        registry.set(id, JobStatus::InProgress);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn next_id_on_empty_dir_is_one() {
        let dir = TempDir::new().unwrap();
        let allocator = JobIdAllocator::new(dir.path(), ArtifactNaming::default());
        assert_eq!(allocator.next_id(), 1);
    }

    #[test]
    fn next_id_on_missing_dir_is_one() {
        let dir = TempDir::new().unwrap();
        let allocator = JobIdAllocator::new(dir.path().join("nope"), ArtifactNaming::default());
        assert_eq!(allocator.next_id(), 1);
    }

    #[test]
    fn next_id_follows_highest_artifact() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.log"), "").unwrap();
        fs::write(dir.path().join("app.log.2.2024-01-01.log"), "").unwrap();
        fs::write(dir.path().join("app.log.9.2024-01-03.log"), "").unwrap();
        fs::write(dir.path().join("app.log.10.2024-01-03.log.part"), "").unwrap();
        fs::write(dir.path().join("unrelated.99.log"), "").unwrap();

        let allocator = JobIdAllocator::new(dir.path(), ArtifactNaming::default());
        assert_eq!(allocator.next_id(), 11);
    }

    #[test]
    fn failure_markers_keep_their_id_claimed() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.log.1.2024-01-01.log"), "").unwrap();
        fs::write(dir.path().join("app.log.2.2024-01-01.log.failed"), "boom").unwrap();

        let allocator = JobIdAllocator::new(dir.path(), ArtifactNaming::default());
        assert_eq!(allocator.next_id(), 3);
    }

    #[test]
    fn allocate_considers_registry_and_reserves_id() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.log.3.d.log"), "").unwrap();
        let registry = JobRegistry::new();
        registry.set(7, JobStatus::Failed("x".to_string()));

        let allocator = JobIdAllocator::new(dir.path(), ArtifactNaming::default());
        let id = allocator.allocate(&registry);

        assert_eq!(id, 8);
        assert_eq!(registry.get(8), Some(JobStatus::InProgress));
        assert_eq!(allocator.allocate(&registry), 9);
    }

    #[test]
    fn concurrent_allocations_are_unique_and_contiguous() {
        let dir = TempDir::new().unwrap();
        let allocator = Arc::new(JobIdAllocator::new(dir.path(), ArtifactNaming::default()));
        let registry = Arc::new(JobRegistry::new());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let allocator = Arc::clone(&allocator);
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    (0..10)
                        .map(|_| allocator.allocate(&registry))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let ids: Vec<JobId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let unique: HashSet<JobId> = ids.iter().copied().collect();

        assert_eq!(unique.len(), 160);
        assert_eq!(unique, (1..=160).collect::<HashSet<_>>());
    }
}
