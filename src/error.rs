use thiserror::Error;

/// Ingestion and session Error
#[derive(Debug, Error)]
pub enum Error {
    /// IO Error
    #[error(transparent)]
    Stream(#[from] std::io::Error),

    /// Entropy source Error
    #[error(transparent)]
    Random(#[from] rand::Error),

    /// Content length is not declared
    #[error("content length is missing")]
    MissingContentLength,

    /// Content length is not a number
    #[error("content length `{0}` is invalid")]
    InvalidContentLength(String),

    /// Payload too large
    #[error("payload is too large, limit to `{0}`")]
    PayloadTooLarge(u64),

    /// Content type declares a boundary which cannot be extracted
    #[error("invalid multipart boundary")]
    InvalidBoundary,

    /// Invalid part header
    #[error("invalid part header")]
    InvalidHeader,

    /// Invalid content disposition
    #[error("invalid content disposition")]
    InvalidContentDisposition,

    /// Content type of a part is not supported
    #[error("unsupported content type `{0}`")]
    UnsupportedContentType(String),

    /// File too large
    #[error("file is too large, limit to `{0}`")]
    FileTooLarge(usize),

    /// Session identifier is malformed or unknown
    #[error("invalid session identifier")]
    InvalidSessionId,

    /// No session has been started or created
    #[error("session is not started")]
    SessionNotStarted,

    /// Session file is truncated or malformed
    #[error("invalid session data")]
    InvalidSessionData,
}
