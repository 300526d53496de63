use std::{fmt, path::PathBuf};

use bytes::Bytes;

/// Content type of a part, as far as ingestion cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartKind {
    /// No `Content-Type` line or `text/plain`
    #[default]
    TextPlain,
    /// `application/octet-stream`
    OctetStream,
    /// Declared but not supported
    Untyped,
}

/// Upload status of a file part.
///
/// Codes match the PHP `UPLOAD_ERR_*` constants consumers already expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum UploadErr {
    /// The file was stored
    #[default]
    Ok = 0,
    /// No file was sent
    NoFile = 4,
    /// The upload directory is missing
    NoTmpDir = 5,
    /// The file is too large or could not be written
    FailedWrite = 6,
}

impl UploadErr {
    /// Gets the numeric code.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for UploadErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Part
pub struct Part {
    /// The index of Part.
    pub index: usize,
    /// The name of Part.
    pub name: String,
    /// The filename of Part, optinal. Its presence marks a file part.
    pub filename: Option<String>,
    /// The declared content type of Part, optinal.
    pub content_type: Option<String>,
    /// The recognized kind of Part.
    pub kind: PartKind,
    /// The payload of Part, a slice of the request body.
    pub body: Bytes,
    /// Upload status, only meaningful for file parts.
    pub error: UploadErr,
    /// Where the payload was stored, only set for written file parts.
    pub stored_path: Option<PathBuf>,
}

impl Part {
    /// Creates an empty part.
    pub fn empty() -> Self {
        Self {
            index: 0,
            name: String::new(),
            filename: None,
            content_type: None,
            kind: PartKind::default(),
            body: Bytes::new(),
            error: UploadErr::default(),
            stored_path: None,
        }
    }

    /// Gets the payload size.
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Checks if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Checks if this is a file part.
    pub fn is_file(&self) -> bool {
        self.filename.is_some()
    }
}

impl fmt::Debug for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Part")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("kind", &self.kind)
            .field("length", &self.len())
            .field("error", &self.error)
            .field("stored_path", &self.stored_path)
            .finish()
    }
}
