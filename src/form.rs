use std::{fs, io::Read};

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::{
    output::aggregate,
    utils::{negotiate, ContentKind},
    CgiEnv, Config, DirStore, Error, Ingested, Limits, Result, State, UploadStore, Uploader,
};

/// Reads a request body and turns it into posted fields and uploaded files.
#[derive(Debug)]
pub struct FormData<S = DirStore> {
    config: Config,
    uploader: Uploader<S>,
}

impl FormData<DirStore> {
    /// Creates new FormData storing uploads in the configured directory.
    pub fn new(config: Config) -> Self {
        let uploader = Uploader::new(&config);
        Self { config, uploader }
    }
}

impl<S> FormData<S>
where
    S: UploadStore,
{
    /// Creates new FormData with a custom store of previous uploads.
    pub fn with_store(config: Config, store: S) -> Self {
        let uploader = Uploader::with_store(&config, store);
        Self { config, uploader }
    }

    /// Gets the config.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Gets the uploader.
    pub fn uploader(&self) -> &Uploader<S> {
        &self.uploader
    }

    /// Reads the body announced by `env` from `reader` and processes it.
    ///
    /// Fails only when the content length is missing, malformed or over the
    /// limit, or when a multipart boundary cannot be extracted. An empty body
    /// yields empty outputs.
    pub fn ingest<R: Read>(&self, env: &CgiEnv, reader: R) -> Result<Ingested> {
        let length = env.content_length()?;

        if let Some(max) = self.config.limits.checked_stream_size(length) {
            return Err(Error::PayloadTooLarge(max));
        }

        if length == 0 {
            return Ok(Ingested::default());
        }

        let body = self.read_body(reader, length);
        self.capture(&body);

        self.process(env.content_type(), body)
    }

    /// Processes a whole body according to its content type.
    pub fn process(&self, content_type: Option<&str>, body: Bytes) -> Result<Ingested> {
        match negotiate(content_type) {
            ContentKind::PlainBody => Ok(Ingested::new(Some(body), None)),
            ContentKind::Multipart { boundary } => Ok(self.multipart(body, &boundary)),
            ContentKind::Unrecognized => Err(Error::InvalidBoundary),
        }
    }

    fn multipart(&self, body: Bytes, boundary: &[u8]) -> Ingested {
        let mut state = State::new(body.clone(), boundary);
        let mut parts = Vec::new();

        for item in state.by_ref() {
            match item {
                Ok(part) => parts.push(part),
                Err(e) => warn!("skipping part: {}", e),
            }
        }

        debug!("got {} parts, {} skipped", state.total(), state.skipped());

        for part in parts.iter_mut().filter(|p| p.is_file()) {
            self.uploader.write(part);
        }

        aggregate(&parts, &body)
    }

    fn read_body<R: Read>(&self, reader: R, length: u64) -> Bytes {
        // the declared length is untrusted when the stream size is unlimited
        let capacity = length.min(Limits::DEFAULT_STREAM_SIZE);
        let mut buf = Vec::with_capacity(usize::try_from(capacity).unwrap_or_default());

        let res = match self.config.replay.as_deref().filter(|p| p.is_file()) {
            Some(path) => {
                debug!("loading body from {}", path.display());
                fs::File::open(path).and_then(|f| f.take(length).read_to_end(&mut buf))
            }
            None => reader.take(length).read_to_end(&mut buf),
        };

        if let Err(e) = res {
            warn!("failed to read post data: {}", e);
        }
        if buf.len() as u64 != length {
            warn!("read {} of {} bytes of post data", buf.len(), length);
        }
        trace!("read {} bytes", buf.len());

        Bytes::from(buf)
    }

    fn capture(&self, body: &[u8]) {
        let Some(path) = &self.config.capture else {
            return;
        };

        match fs::write(path, body) {
            Ok(()) => debug!("saved body to {}", path.display()),
            Err(e) => warn!("failed to save body to {}: {}", path.display(), e),
        }
    }
}
