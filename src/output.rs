use bytes::{BufMut, Bytes, BytesMut};

use crate::Part;

/// The two outputs of an ingestion, each readable once.
#[derive(Debug, Default)]
pub struct Ingested {
    posted: Option<Bytes>,
    files: Option<String>,
}

impl Ingested {
    /// Creates new Ingested.
    pub fn new(posted: Option<Bytes>, files: Option<String>) -> Self {
        Self { posted, files }
    }

    /// Takes the posted fields, `name=value` pairs joined by `&`.
    ///
    /// Returns `None` on every call after the first.
    pub fn take_posted(&mut self) -> Option<Bytes> {
        self.posted.take()
    }

    /// Takes the uploaded files, one `id=..&name=..&type=..&size=..&tmp_name=..&error=..`
    /// record per file, joined by `;`.
    ///
    /// Returns `None` on every call after the first.
    pub fn take_files(&mut self) -> Option<String> {
        self.files.take()
    }

    /// Checks if both outputs are gone.
    pub fn is_empty(&self) -> bool {
        self.posted.is_none() && self.files.is_none()
    }
}

/// Builds both outputs from parsed parts.
///
/// Without any non-file part, the posted fields are the whole raw body.
pub fn aggregate(parts: &[Part], raw: &Bytes) -> Ingested {
    Ingested::new(Some(posted_fields(parts, raw)), uploaded_files(parts))
}

fn posted_fields(parts: &[Part], raw: &Bytes) -> Bytes {
    let fields = parts.iter().filter(|p| !p.is_file());

    if fields.clone().next().is_none() {
        return raw.clone();
    }

    // sized up front, `&` separators included
    let len = fields
        .clone()
        .enumerate()
        .map(|(i, p)| usize::from(i > 0) + p.name.len() + 1 + p.len())
        .sum::<usize>();

    let mut buf = BytesMut::with_capacity(len);
    for (i, part) in fields.enumerate() {
        if i > 0 {
            buf.put_u8(b'&');
        }
        buf.put_slice(part.name.as_bytes());
        buf.put_u8(b'=');
        buf.put_slice(&part.body);
    }

    tracing::debug!("posted fields {} bytes", buf.len());

    buf.freeze()
}

fn uploaded_files(parts: &[Part]) -> Option<String> {
    let files = parts
        .iter()
        .filter(|p| p.is_file())
        .map(|part| {
            format!(
                "id={}&name={}&type={}&size={}&tmp_name={}&error={}",
                part.name,
                part.filename.as_deref().unwrap_or_default(),
                part.content_type
                    .as_deref()
                    .unwrap_or(mime::TEXT_PLAIN.essence_str()),
                part.len(),
                part.stored_path
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                part.error,
            )
        })
        .collect::<Vec<_>>()
        .join(";");

    if files.is_empty() {
        return None;
    }

    tracing::debug!("uploaded files {}", files);

    Some(files)
}
