use std::ops::Range;

use bytes::{BufMut, Bytes, BytesMut};
use memchr::{memchr, memmem};

use crate::{Error, Part, PartKind, Result};

pub(crate) const DASHES: [u8; 2] = [b'-', b'-']; // `--`
pub(crate) const CRLF: [u8; 2] = [b'\r', b'\n']; // `\r\n`
pub(crate) const NUL_LF: [u8; 2] = [b'\0', b'\n']; // `\0\n`

pub(crate) const CONTENT_DISPOSITION: &[u8; 19] = b"Content-Disposition";
pub(crate) const CONTENT_TYPE: &[u8; 12] = b"Content-Type";

const NAME: &[u8] = b"name";
const FILE_NAME: &[u8] = b"filename";
const FORM_DATA: &[u8; 9] = b"form-data";

/// How a request body has to be read, decided from its content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentKind {
    /// Anything that is not `multipart/form-data`, passed through as is.
    PlainBody,
    /// `multipart/form-data`, with the on-wire delimiter `--boundary`.
    Multipart {
        /// The delimiter, including its leading dashes.
        boundary: Bytes,
    },
    /// `multipart/form-data` whose boundary cannot be extracted.
    Unrecognized,
}

/// Inspects a content type declaration.
///
/// The boundary parameter may be quoted, in which case it ends at the closing
/// quote, or bare, in which case it ends at `,`, `;` or the end of the value.
pub fn negotiate(content_type: Option<&str>) -> ContentKind {
    let Some(value) =
        content_type.filter(|v| v.contains(mime::MULTIPART_FORM_DATA.essence_str()))
    else {
        return ContentKind::PlainBody;
    };

    let Some(raw) = value
        .find(mime::BOUNDARY.as_str())
        .map(|i| &value[i..])
        .and_then(|rest| rest.find('=').map(|i| &rest[i + 1..]))
    else {
        return ContentKind::Unrecognized;
    };

    let raw = match raw.strip_prefix('"') {
        Some(quoted) => match quoted.find('"') {
            Some(end) => &quoted[..end],
            None => return ContentKind::Unrecognized,
        },
        None => raw
            .find(|c: char| c == ',' || c == ';')
            .map_or(raw, |end| &raw[..end]),
    };

    if raw.is_empty() {
        return ContentKind::Unrecognized;
    }

    let mut boundary = BytesMut::with_capacity(DASHES.len() + raw.len());
    boundary.put_slice(&DASHES);
    boundary.put_slice(raw.as_bytes());

    ContentKind::Multipart {
        boundary: boundary.freeze(),
    }
}

/// Finds the line following the one `cursor` is on.
///
/// The terminator of the current line (`\r\n`, or `\0\n` left behind by a
/// NUL-truncating producer) is skipped first, then the next line runs up to
/// the following `\r\n`. The end of the returned span is the cursor for the
/// next call. Returns `None` when no complete line is left.
pub(crate) fn next_line(buf: &[u8], mut cursor: usize) -> Option<Range<usize>> {
    while cursor < buf.len() {
        let rest = &buf[cursor..];
        if rest.starts_with(&CRLF) || rest.starts_with(&NUL_LF) {
            cursor += 2;
            break;
        }
        cursor += 1;
    }

    if cursor >= buf.len() {
        return None;
    }

    memmem::find(&buf[cursor..], &CRLF).map(|n| cursor..cursor + n)
}

/// Parses `Content-Disposition: form-data; name="file"; filename="a.txt"`.
pub(crate) fn parse_content_disposition(line: &[u8]) -> Result<(String, Option<String>)> {
    let mut data = memmem::find(line, FORM_DATA)
        .map(|i| &line[i + FORM_DATA.len()..])
        .and_then(|rest| memchr(b';', rest).map(|i| &rest[i + 1..]))
        .filter(|rest| !rest.is_empty());

    if data.is_none() {
        return Err(Error::InvalidContentDisposition);
    }

    let mut name = None;
    let mut filename = None;

    while let Some((key, value, next)) = data.and_then(parse_name_value_pair) {
        match key {
            NAME => name = Some(String::from_utf8_lossy(value).into_owned()),
            FILE_NAME => filename = Some(String::from_utf8_lossy(value).into_owned()),
            _ => tracing::trace!("ignoring attribute {}", String::from_utf8_lossy(key)),
        }
        data = next;
    }

    name.map(|name| (name, filename))
        .ok_or(Error::InvalidContentDisposition)
}

/// Parses one `key=value` or `key="value"` attribute.
///
/// Returns the key, the value and what follows the next `;`, if anything.
fn parse_name_value_pair(data: &[u8]) -> Option<(&[u8], &[u8], Option<&[u8]>)> {
    let data = data.trim_ascii_start();
    let eq = memchr(b'=', data)?;
    let key = data[..eq].trim_ascii_end();
    let rest = data[eq + 1..].trim_ascii_start();

    if key.is_empty() || rest.is_empty() {
        return None;
    }

    let (value, tail) = match rest.strip_prefix(b"\"") {
        Some(quoted) => match memchr(b'"', quoted) {
            Some(end) => (&quoted[..end], &quoted[end + 1..]),
            None => {
                tracing::warn!("missing closing quote in part header");
                (quoted, &quoted[quoted.len()..])
            }
        },
        None => {
            let end = rest
                .iter()
                .position(|b| *b == b';' || b.is_ascii_whitespace())
                .unwrap_or(rest.len());
            (&rest[..end], &rest[end..])
        }
    };

    let next = memchr(b';', tail).map(|i| &tail[i + 1..]);

    Some((key, value, next))
}

/// Parses `Content-Type: application/octet-stream` into `part`.
///
/// The declared value is kept even when it is not supported; the part is then
/// left untyped and an error is returned.
pub(crate) fn parse_part_content_type(line: &[u8], part: &mut Part) -> Result<()> {
    part.kind = PartKind::Untyped;

    let value = memchr(b':', line)
        .map(|i| line[i + 1..].trim_ascii_start())
        .filter(|value| !value.is_empty())
        .ok_or(Error::InvalidHeader)?;

    let value = String::from_utf8_lossy(value).into_owned();

    if value.starts_with(mime::TEXT_PLAIN.essence_str()) {
        part.kind = PartKind::TextPlain;
    } else if value.starts_with(mime::APPLICATION_OCTET_STREAM.essence_str()) {
        part.kind = PartKind::OctetStream;
    }

    let supported = part.kind != PartKind::Untyped;
    part.content_type.replace(value);

    if supported {
        Ok(())
    } else {
        Err(Error::UnsupportedContentType(
            part.content_type.clone().unwrap_or_default(),
        ))
    }
}
