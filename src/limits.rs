use serde::{Deserialize, Serialize};

/// Various limits on incoming data and retained uploads
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Limits {
    /// Max size of the whole request body
    pub stream_size: Option<u64>,
    /// Max size of a single uploaded file
    pub file_size: Option<usize>,
    /// Max disk space used by all retained uploads
    pub disk_space: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            stream_size: Some(Self::DEFAULT_STREAM_SIZE),
            file_size: Some(Self::DEFAULT_FILE_SIZE),
            disk_space: Self::DEFAULT_DISK_SPACE,
        }
    }
}

impl Limits {
    /// Max number of stream size, defaults to 8MB.
    pub const DEFAULT_STREAM_SIZE: u64 = 8 * 1024 * 1024;

    /// Max number of file size, defaults to 2MB.
    pub const DEFAULT_FILE_SIZE: usize = 2 * 1024 * 1024;

    /// Max disk space for uploads, defaults to 8MB.
    pub const DEFAULT_DISK_SPACE: u64 = 8 * 1024 * 1024;

    /// Max number of whole stream size
    #[must_use]
    pub fn stream_size(mut self, max: u64) -> Self {
        self.stream_size.replace(max);
        self
    }

    /// Max file size
    #[must_use]
    pub fn file_size(mut self, max: usize) -> Self {
        self.file_size.replace(max);
        self
    }

    /// Max disk space for all retained uploads
    #[must_use]
    pub fn disk_space(mut self, max: u64) -> Self {
        self.disk_space = max;
        self
    }

    /// Check stream size
    #[must_use]
    pub fn checked_stream_size(&self, rhs: u64) -> Option<u64> {
        self.stream_size.filter(|max| rhs > *max)
    }

    /// Check file size
    #[must_use]
    pub fn checked_file_size(&self, rhs: usize) -> Option<usize> {
        self.file_size.filter(|max| rhs > *max)
    }
}
