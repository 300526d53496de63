#![allow(dead_code)]

use http::{
    header::{CONTENT_LENGTH, CONTENT_TYPE, COOKIE},
    HeaderMap, HeaderValue,
};

use cgi_form::CgiEnv;

pub fn tracing_init() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        // From env var: `RUST_LOG`
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .or_else(|_| Ok(()))
}

/// A CGI environment announcing `body`.
pub fn cgi_env(content_type: Option<&str>, body: &[u8], cookie: Option<&str>) -> CgiEnv {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    if let Some(ct) = content_type {
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(ct).unwrap());
    }
    if let Some(c) = cookie {
        headers.insert(COOKIE, HeaderValue::from_str(c).unwrap());
    }
    CgiEnv::new(headers)
}

/// Builds a multipart body, `(name, filename, content type, payload)` per part.
pub fn multipart(boundary: &str, parts: &[(&str, Option<&str>, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, content_type, payload) in parts {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{name}\"").as_bytes());
        if let Some(filename) = filename {
            body.extend_from_slice(format!("; filename=\"{filename}\"").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        if let Some(ct) = content_type {
            body.extend_from_slice(format!("Content-Type: {ct}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(payload);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}
