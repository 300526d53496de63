use std::env;

use http::{
    header::{CONTENT_LENGTH, CONTENT_TYPE, COOKIE},
    HeaderMap, HeaderName, HeaderValue,
};
use tracing::warn;

use crate::{Error, Result};

/// The CGI request metadata this crate consumes.
///
/// CGI passes request headers as environment variables; only the three the
/// ingestion and session pipelines need are kept, under their HTTP names.
#[derive(Debug, Clone, Default)]
pub struct CgiEnv {
    headers: HeaderMap,
}

impl CgiEnv {
    /// Creates from explicit headers.
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }

    /// Reads `CONTENT_LENGTH`, `CONTENT_TYPE` and `HTTP_COOKIE` from the process environment.
    pub fn from_env() -> Self {
        let mut headers = HeaderMap::with_capacity(3);

        for (var, name) in [
            ("CONTENT_LENGTH", CONTENT_LENGTH),
            ("CONTENT_TYPE", CONTENT_TYPE),
            ("HTTP_COOKIE", COOKIE),
        ] {
            if let Some(value) = env::var_os(var) {
                insert(&mut headers, name, &value.to_string_lossy());
            }
        }

        Self { headers }
    }

    /// Gets the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Gets the declared content type.
    pub fn content_type(&self) -> Option<&str> {
        self.get(&CONTENT_TYPE)
    }

    /// Gets the cookie header.
    pub fn cookie(&self) -> Option<&str> {
        self.get(&COOKIE)
    }

    /// Parses the declared content length.
    pub fn content_length(&self) -> Result<u64> {
        let raw = self.get(&CONTENT_LENGTH).ok_or(Error::MissingContentLength)?;
        raw.trim()
            .parse()
            .map_err(|_| Error::InvalidContentLength(raw.to_string()))
    }

    fn get(&self, name: &HeaderName) -> Option<&str> {
        self.headers
            .get(name)
            .map(HeaderValue::to_str)
            .and_then(std::result::Result::ok)
    }
}

fn insert(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(_) => warn!("ignoring malformed `{}` value", name),
    }
}
