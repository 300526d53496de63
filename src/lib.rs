//! CGI request body ingestion and file-backed sessions.
//!
//! A request body is read once per process, then split into two outputs:
//! the posted fields (`name=value` pairs joined by `&`, values passed through
//! undecoded) and the uploaded files, written to a temporary directory kept
//! within a disk budget. `multipart/form-data` bodies are parsed by hand
//! ([rfc1867], [rfc2046]); any other body is passed through as is.
//!
//! Sessions persist a small typed key/value record per client in a file named
//! after the session identifier carried by a cookie.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::io;
//!
//! use cgi_form::{CgiEnv, Config, FormData, Session};
//!
//! let env = CgiEnv::from_env();
//! let config = Config::default();
//!
//! let mut ingested = FormData::new(config.clone()).ingest(&env, io::stdin().lock())?;
//!
//! if let Some(posted) = ingested.take_posted() {
//!     tracing::info!("post {}", String::from_utf8_lossy(&posted));
//! }
//! if let Some(files) = ingested.take_files() {
//!     tracing::info!("files {}", files);
//! }
//!
//! let mut session = Session::new(&config);
//! if !session.start(env.cookie()) {
//!     session.create();
//! }
//! let mut record = session.get_data().unwrap_or_default();
//! record.insert("visits", 1);
//! session.set_data(&record);
//! # Ok::<(), cgi_form::Error>(())
//! ```
//!
//! [rfc1867]: <https://datatracker.ietf.org/doc/html/rfc1867>
//! [rfc2046]: <https://datatracker.ietf.org/doc/html/rfc2046>

#![forbid(unsafe_code)]
#![deny(nonstandard_style)]
#![warn(missing_docs, unreachable_pub)]

mod config;
mod env;
mod error;
mod field;
mod form;
mod limits;
mod output;
mod quota;
mod record;
mod session;
mod state;
mod store;
mod upload;
mod utils;

pub use config::Config;

pub use env::CgiEnv;

pub use error::Error;

pub use field::{Part, PartKind, UploadErr};

pub use form::FormData;

pub use limits::Limits;

pub use output::{aggregate, Ingested};

pub use quota::{DirStore, DiskQuota, EvictionPolicy, TrackedFile, UploadStore};

pub use record::{SessionRecord, SessionValue, NUMBER_PRECISION};

pub use session::{CsprngSource, OsRandom, Session, TOKEN_LENGTH};

pub use state::State;

pub use store::SessionStore;

pub use upload::Uploader;

pub use utils::{negotiate, ContentKind};

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;
