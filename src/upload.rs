use std::{
    io::Write,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{Config, DirStore, DiskQuota, Error, Limits, Part, Result, UploadErr, UploadStore};

/// Length of the random filename suffix.
const RAND_BYTES: usize = 6;

/// Writes file parts to the upload directory.
#[derive(Debug)]
pub struct Uploader<S> {
    store: S,
    quota: DiskQuota,
    limits: Limits,
    dir: PathBuf,
    prefix: String,
}

impl Uploader<DirStore> {
    /// Creates new Uploader over the configured upload directory.
    pub fn new(config: &Config) -> Self {
        Self::with_store(
            config,
            DirStore::new(&config.upload_dir, config.upload_prefix.clone()),
        )
    }
}

impl<S> Uploader<S>
where
    S: UploadStore,
{
    /// Creates new Uploader with a custom store of previous uploads.
    pub fn with_store(config: &Config, store: S) -> Self {
        Self {
            store,
            quota: DiskQuota::new(config.eviction, config.limits.disk_space),
            limits: config.limits.clone(),
            dir: config.upload_dir.clone(),
            prefix: config.upload_prefix.clone(),
        }
    }

    /// Gets the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Gets the upload directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stores the payload of a file part, recording the outcome on the part.
    ///
    /// Room is made for the upload before it is written; a payload over the
    /// file size limit is rejected without touching previous uploads.
    pub fn write(&self, part: &mut Part) -> UploadErr {
        part.stored_path = None;
        part.error = match self.persist(part) {
            Ok(path) => {
                debug!("file {} uploaded", path.display());
                part.stored_path.replace(path);
                UploadErr::Ok
            }
            Err(Error::Stream(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("upload directory {} is missing: {}", self.dir.display(), e);
                UploadErr::NoTmpDir
            }
            Err(e) => {
                warn!("failed to save upload `{}`: {}", part.name, e);
                UploadErr::FailedWrite
            }
        };
        part.error
    }

    fn persist(&self, part: &Part) -> Result<PathBuf> {
        if let Some(max) = self.limits.checked_file_size(part.len()) {
            return Err(Error::FileTooLarge(max));
        }

        self.quota.enforce(&self.store, part.len() as u64);

        let mut file = tempfile::Builder::new()
            .prefix(&self.prefix)
            .rand_bytes(RAND_BYTES)
            .tempfile_in(&self.dir)?;

        file.write_all(&part.body)?;
        file.flush()?;

        let (_, path) = file.keep().map_err(|e| e.error)?;

        Ok(path)
    }
}
