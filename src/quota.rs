use std::{
    fs, io,
    path::{Path, PathBuf},
    time::SystemTime,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// What happens to previous uploads before a new one is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum EvictionPolicy {
    /// Evict least recently accessed uploads until the budget fits.
    #[default]
    Oldest,
    /// Remove every previous upload, keeping at most one.
    ReplaceAll,
}

/// An upload retained on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedFile {
    /// Where it lives
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Last access time
    pub last_access: SystemTime,
}

/// Access to the retained uploads.
pub trait UploadStore {
    /// Lists every retained upload, in directory order.
    fn list_tracked_files(&self) -> io::Result<Vec<TrackedFile>>;

    /// Deletes one upload.
    fn delete(&self, path: &Path) -> io::Result<()>;
}

impl<S: UploadStore + ?Sized> UploadStore for &S {
    fn list_tracked_files(&self) -> io::Result<Vec<TrackedFile>> {
        (**self).list_tracked_files()
    }

    fn delete(&self, path: &Path) -> io::Result<()> {
        (**self).delete(path)
    }
}

/// Uploads kept as regular files with a common prefix in one directory.
#[derive(Debug, Clone)]
pub struct DirStore {
    dir: PathBuf,
    prefix: String,
}

impl DirStore {
    /// Creates new DirStore.
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Gets the directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Gets the filename prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl UploadStore for DirStore {
    fn list_tracked_files(&self) -> io::Result<Vec<TrackedFile>> {
        let mut files = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;

            if !entry.file_type()?.is_file()
                || !entry.file_name().to_string_lossy().starts_with(&self.prefix)
            {
                continue;
            }

            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(e) => {
                    warn!("failed to stat upload {}: {}", entry.path().display(), e);
                    continue;
                }
            };

            files.push(TrackedFile {
                path: entry.path(),
                size: meta.len(),
                last_access: meta
                    .accessed()
                    .or_else(|_| meta.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }

        Ok(files)
    }

    fn delete(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// Keeps retained uploads within a disk budget.
#[derive(Debug, Clone, Copy)]
pub struct DiskQuota {
    policy: EvictionPolicy,
    budget: u64,
}

impl DiskQuota {
    /// Creates new DiskQuota.
    pub fn new(policy: EvictionPolicy, budget: u64) -> Self {
        Self { policy, budget }
    }

    /// Gets the budget.
    pub fn budget(&self) -> u64 {
        self.budget
    }

    /// Makes room for an incoming upload of `incoming` bytes.
    ///
    /// Returns the tracked total afterwards, the incoming upload included.
    /// Failed deletions are logged and do not count as freed space.
    pub fn enforce<S: UploadStore + ?Sized>(&self, store: &S, incoming: u64) -> u64 {
        let mut files = match store.list_tracked_files() {
            Ok(files) => files,
            Err(e) => {
                warn!("failed to list previous uploads: {}", e);
                return incoming;
            }
        };

        let mut total = files.iter().fold(incoming, |sum, f| sum + f.size);

        match self.policy {
            EvictionPolicy::ReplaceAll => {
                for file in &files {
                    total -= remove(store, file);
                }
            }
            EvictionPolicy::Oldest => {
                // largest age first; stable, so ties keep directory order
                files.sort_by_key(|f| f.last_access);

                for file in &files {
                    if total <= self.budget {
                        break;
                    }
                    total -= remove(store, file);
                }
            }
        }

        debug!("tracked uploads total {} of {}", total, self.budget);

        total
    }
}

fn remove<S: UploadStore + ?Sized>(store: &S, file: &TrackedFile) -> u64 {
    debug!("removing previous upload {}", file.path.display());

    match store.delete(&file.path) {
        Ok(()) => file.size,
        Err(e) => {
            warn!("failed to remove upload {}: {}", file.path.display(), e);
            0
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        cell::{Cell, RefCell},
        collections::HashSet,
        io,
        path::{Path, PathBuf},
        time::{Duration, SystemTime},
    };

    use super::{DiskQuota, EvictionPolicy, TrackedFile, UploadStore};

    /// Uploads kept in memory.
    #[derive(Default)]
    pub(crate) struct MemStore {
        pub(crate) files: RefCell<Vec<TrackedFile>>,
        pub(crate) locked: HashSet<PathBuf>,
        pub(crate) lists: Cell<usize>,
    }

    impl MemStore {
        pub(crate) fn with(files: &[(&str, u64, u64)]) -> Self {
            let store = Self::default();
            store.files.replace(
                files
                    .iter()
                    .map(|(name, size, secs)| TrackedFile {
                        path: PathBuf::from(name),
                        size: *size,
                        last_access: SystemTime::UNIX_EPOCH + Duration::from_secs(*secs),
                    })
                    .collect(),
            );
            store
        }

        pub(crate) fn names(&self) -> Vec<String> {
            self.files
                .borrow()
                .iter()
                .map(|f| f.path.display().to_string())
                .collect()
        }
    }

    impl UploadStore for MemStore {
        fn list_tracked_files(&self) -> io::Result<Vec<TrackedFile>> {
            self.lists.set(self.lists.get() + 1);
            Ok(self.files.borrow().clone())
        }

        fn delete(&self, path: &Path) -> io::Result<()> {
            if self.locked.contains(path) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"));
            }
            self.files.borrow_mut().retain(|f| f.path != path);
            Ok(())
        }
    }

    #[test]
    fn evicts_oldest_first() {
        let store = MemStore::with(&[("new", 3, 300), ("old", 3, 100), ("mid", 3, 200)]);
        let quota = DiskQuota::new(EvictionPolicy::Oldest, 10);

        // 9 + 4 > 10, dropping `old` is enough
        assert_eq!(quota.enforce(&store, 4), 10);
        assert_eq!(store.names(), ["new", "mid"]);
    }

    #[test]
    fn keeps_everything_within_budget() {
        let store = MemStore::with(&[("a", 3, 100), ("b", 3, 200)]);
        let quota = DiskQuota::new(EvictionPolicy::Oldest, 10);

        assert_eq!(quota.enforce(&store, 4), 10);
        assert_eq!(store.names(), ["a", "b"]);
    }

    #[test]
    fn failed_deletion_is_not_counted() {
        let mut store = MemStore::with(&[("stuck", 5, 100), ("old", 5, 200), ("new", 2, 300)]);
        store.locked.insert(PathBuf::from("stuck"));
        let quota = DiskQuota::new(EvictionPolicy::Oldest, 10);

        assert_eq!(quota.enforce(&store, 3), 10);
        assert_eq!(store.names(), ["stuck", "new"]);
    }

    #[test]
    fn replace_all_keeps_nothing() {
        let store = MemStore::with(&[("a", 1, 100), ("b", 1, 200)]);
        let quota = DiskQuota::new(EvictionPolicy::ReplaceAll, 10);

        assert_eq!(quota.enforce(&store, 2), 2);
        assert!(store.names().is_empty());
    }

    #[test]
    fn never_above_budget() {
        let file_size = 4;
        let budget = 16;
        let quota = DiskQuota::new(EvictionPolicy::Oldest, budget);

        // start at most one file over budget, in every size mix
        for sizes in [[4, 4, 4, 4, 4], [1, 2, 3, 4, 4], [4, 1, 4, 1, 4], [0, 0, 4, 4, 4]] {
            let files = sizes
                .iter()
                .enumerate()
                .map(|(i, size)| (["a", "b", "c", "d", "e"][i], *size, i as u64))
                .collect::<Vec<_>>();
            assert!(sizes.iter().sum::<u64>() <= budget + file_size);

            for incoming in 0..=file_size {
                let store = MemStore::with(&files);
                assert!(quota.enforce(&store, incoming) <= budget);
            }
        }
    }
}
