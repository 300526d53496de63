use std::{
    fs::{self, FileTimes, OpenOptions},
    path::{Path, PathBuf},
    time::SystemTime,
};

use tracing::{debug, warn};

use crate::{Result, SessionRecord};

/// Session files, one per identifier, in a single directory.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Creates new SessionStore.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Gets the directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Gets the file backing a session.
    pub fn path(&self, id: &str) -> PathBuf {
        self.dir.join(id)
    }

    /// Checks if a session file exists.
    pub fn exists(&self, id: &str) -> bool {
        self.path(id).exists()
    }

    /// Loads a session record.
    ///
    /// A truncated or malformed file yields an empty record.
    pub fn read(&self, id: &str) -> Result<SessionRecord> {
        let path = self.path(id);
        let contents = fs::read(&path)?;

        match SessionRecord::decode(&contents) {
            Ok(record) => {
                debug!("read {} session entries from {}", record.len(), path.display());
                Ok(record)
            }
            Err(e) => {
                warn!("discarding session file {}: {}", path.display(), e);
                Ok(SessionRecord::new())
            }
        }
    }

    /// Overwrites a session file with `record`.
    pub fn write(&self, id: &str, record: &SessionRecord) -> Result<()> {
        let path = self.path(id);
        fs::write(&path, record.encode())?;
        debug!("session file written {}", path.display());
        Ok(())
    }

    /// Deletes a session file.
    pub fn remove(&self, id: &str) -> Result<()> {
        let path = self.path(id);
        debug!("removing session file {}", path.display());
        fs::remove_file(path)?;
        Ok(())
    }

    /// Sets the access and modification times of a session file to now.
    pub fn touch(&self, id: &str) -> Result<()> {
        let now = SystemTime::now();
        OpenOptions::new()
            .write(true)
            .open(self.path(id))?
            .set_times(FileTimes::new().set_accessed(now).set_modified(now))?;
        Ok(())
    }
}
