use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{EvictionPolicy, Limits};

/// Where uploads and sessions live, and how they are named.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Directory holding uploaded files
    pub upload_dir: PathBuf,
    /// Filename prefix of every uploaded file
    pub upload_prefix: String,
    /// Directory holding session files
    pub session_dir: PathBuf,
    /// Literal prefix of every session identifier
    pub session_prefix: String,
    /// Cookie carrying the session identifier
    pub cookie_name: String,
    /// Policy applied to previous uploads before a new one is written
    pub eviction: EvictionPolicy,
    /// Size limits
    pub limits: Limits,
    /// Saves the raw request body to this path once it is read
    pub capture: Option<PathBuf>,
    /// Loads the request body from this path instead of the input stream
    pub replay: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from(Self::DEFAULT_DIR),
            upload_prefix: Self::DEFAULT_UPLOAD_PREFIX.to_string(),
            session_dir: PathBuf::from(Self::DEFAULT_DIR),
            session_prefix: Self::DEFAULT_SESSION_PREFIX.to_string(),
            cookie_name: Self::DEFAULT_COOKIE_NAME.to_string(),
            eviction: EvictionPolicy::default(),
            limits: Limits::default(),
            capture: None,
            replay: None,
        }
    }
}

impl Config {
    /// Uploads and sessions both default to `/tmp`.
    pub const DEFAULT_DIR: &'static str = "/tmp";

    /// Prefix of uploaded files, defaults to `jst_post_`.
    pub const DEFAULT_UPLOAD_PREFIX: &'static str = "jst_post_";

    /// Prefix of session identifiers, defaults to `jst_sess`.
    pub const DEFAULT_SESSION_PREFIX: &'static str = "jst_sess";

    /// Session cookie name, defaults to `DUKSID`.
    pub const DEFAULT_COOKIE_NAME: &'static str = "DUKSID";

    /// Upload directory
    #[must_use]
    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = dir.into();
        self
    }

    /// Upload filename prefix
    #[must_use]
    pub fn upload_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.upload_prefix = prefix.into();
        self
    }

    /// Session directory
    #[must_use]
    pub fn session_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.session_dir = dir.into();
        self
    }

    /// Session identifier prefix
    #[must_use]
    pub fn session_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.session_prefix = prefix.into();
        self
    }

    /// Session cookie name
    #[must_use]
    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Eviction policy
    #[must_use]
    pub fn eviction(mut self, policy: EvictionPolicy) -> Self {
        self.eviction = policy;
        self
    }

    /// Size limits
    #[must_use]
    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Capture path for raw bodies
    #[must_use]
    pub fn capture(mut self, path: impl Into<PathBuf>) -> Self {
        self.capture.replace(path.into());
        self
    }

    /// Replay path for raw bodies
    #[must_use]
    pub fn replay(mut self, path: impl Into<PathBuf>) -> Self {
        self.replay.replace(path.into());
        self
    }
}
