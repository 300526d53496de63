use std::{fmt, mem};

use bytes::Bytes;
use memchr::memmem::Finder;
use tracing::{trace, warn};

use crate::{
    utils::{
        next_line, parse_content_disposition, parse_part_content_type, CONTENT_DISPOSITION,
        CONTENT_TYPE, CRLF, DASHES,
    },
    Error, Part, Result,
};

#[derive(Debug)]
enum Flag {
    Delimiting,
    Headed,
    Header,
    Body(Part),
    Eof,
}

/// Multipart parser state.
///
/// Yields the parts of a buffered `multipart/form-data` body in the order they
/// appear. A malformed part is yielded as an error and parsing resumes at the
/// next boundary, so the iterator keeps going after an `Err`.
pub struct State {
    flag: Flag,
    total: usize,
    skipped: usize,
    cursor: usize,
    buffer: Bytes,
    finder: Finder<'static>,
}

impl State {
    /// Creates new State over a whole body, `boundary` being the `--`-prefixed delimiter.
    pub fn new(buffer: Bytes, boundary: &[u8]) -> Self {
        Self {
            buffer,
            total: 0,
            skipped: 0,
            cursor: 0,
            flag: Flag::Delimiting,
            finder: Finder::new(boundary).into_owned(),
        }
    }

    fn index(&mut self) -> usize {
        let index = self.total;
        self.total += 1;
        index
    }

    /// Gets EOF.
    pub fn eof(&self) -> bool {
        matches!(self.flag, Flag::Eof)
    }

    /// Counts the parts.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Counts the malformed parts.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Gets the boundary.
    pub fn boundary(&self) -> &[u8] {
        self.finder.needle()
    }

    fn decode_headers(&mut self) -> Result<Part> {
        let buffer = self.buffer.clone();
        let mut part = Part::empty();
        let mut names = None;
        let mut cursor = self.cursor;

        loop {
            let Some(line) = next_line(&buffer, cursor) else {
                self.cursor = cursor;
                return Err(Error::InvalidHeader);
            };

            if line.is_empty() {
                // body follows the blank line
                self.cursor = line.start + CRLF.len();
                break;
            }

            let text = &buffer[line.clone()];

            if text.starts_with(CONTENT_DISPOSITION) {
                names = parse_content_disposition(text)
                    .map_err(|e| warn!("{}: {}", e, String::from_utf8_lossy(text)))
                    .ok();
            } else if text.starts_with(CONTENT_TYPE) {
                if let Err(e) = parse_part_content_type(text, &mut part) {
                    warn!("{}", e);
                }
            } else {
                trace!("skipping header {}", String::from_utf8_lossy(text));
            }

            cursor = line.end;
        }

        let (name, filename) = names.ok_or(Error::InvalidContentDisposition)?;
        part.name = name;
        part.filename = filename;

        Ok(part)
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("eof", &self.eof())
            .field("total", &self.total)
            .field("skipped", &self.skipped)
            .field("cursor", &self.cursor)
            .field("length", &self.buffer.len())
            .field("boundary", &String::from_utf8_lossy(self.boundary()))
            .finish()
    }
}

impl Iterator for State {
    type Item = Result<Part>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match mem::replace(&mut self.flag, Flag::Eof) {
                Flag::Delimiting => {
                    let found = match self.finder.needle() {
                        [] => None,
                        _ => self.finder.find(&self.buffer[self.cursor..]),
                    };
                    if let Some(n) = found {
                        self.cursor += n + self.finder.needle().len();
                        self.flag = Flag::Headed;
                    } else {
                        trace!("no more boundaries");
                        self.cursor = self.buffer.len();
                    }
                }
                Flag::Headed => {
                    let rest = &self.buffer[self.cursor..];
                    if rest.is_empty() || rest.starts_with(&DASHES) {
                        trace!("terminal boundary");
                    } else {
                        self.flag = Flag::Header;
                    }
                }
                Flag::Header => match self.decode_headers() {
                    Ok(part) => self.flag = Flag::Body(part),
                    Err(e) => {
                        self.skipped += 1;
                        self.flag = Flag::Delimiting;
                        return Some(Err(e));
                    }
                },
                Flag::Body(mut part) => {
                    let start = self.cursor;
                    let Some(n) = self.finder.find(&self.buffer[start..]) else {
                        // truncated body, keep whatever arrived
                        warn!("part `{}` is not terminated by a boundary", part.name);
                        part.body = self.buffer.slice(start..);
                        part.index = self.index();
                        self.cursor = self.buffer.len();
                        return Some(Ok(part));
                    };

                    // the `\r\n` before the boundary is not part of the body
                    let end = (start + n).saturating_sub(CRLF.len()).max(start);

                    part.body = self.buffer.slice(start..end);
                    part.index = self.index();
                    trace!("part decoded from buffer: {:?}", part);

                    self.cursor = start + n;
                    self.flag = Flag::Delimiting;
                    return Some(Ok(part));
                }
                Flag::Eof => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::State;
    use crate::{Error, PartKind};

    fn parse(body: &'static [u8]) -> State {
        State::new(Bytes::from_static(body), b"--XYZ")
    }

    #[test]
    fn parts_in_body_order() {
        let mut state = parse(
            b"preamble\r\n--XYZ\r\n\
              Content-Disposition: form-data; name=\"color\"\r\n\
              \r\n\
              red\r\n\
              --XYZ\r\n\
              Content-Disposition: form-data; name=\"file\"; filename=\"a.bin\"\r\n\
              Content-Type: application/octet-stream\r\n\
              X-Extra: ignored\r\n\
              \r\n\
              \x00\x01\r\n\x02\r\n\
              --XYZ--\r\n",
        );

        let color = state.next().unwrap().unwrap();
        assert_eq!(color.index, 0);
        assert_eq!(color.name, "color");
        assert_eq!(color.filename, None);
        assert_eq!(color.kind, PartKind::TextPlain);
        assert_eq!(color.body, "red");

        let file = state.next().unwrap().unwrap();
        assert_eq!(file.index, 1);
        assert_eq!(file.name, "file");
        assert_eq!(file.filename.as_deref(), Some("a.bin"));
        assert_eq!(file.kind, PartKind::OctetStream);
        assert_eq!(file.body, &b"\x00\x01\r\n\x02"[..]);

        assert!(state.next().is_none());
        assert!(state.eof());
        assert_eq!(state.total(), 2);
        assert_eq!(state.skipped(), 0);
    }

    #[test]
    fn empty_body() {
        let mut state = parse(
            b"--XYZ\r\nContent-Disposition: form-data; name=\"empty\"\r\n\r\n\r\n--XYZ--",
        );

        let part = state.next().unwrap().unwrap();
        assert_eq!(part.name, "empty");
        assert!(part.is_empty());
        assert!(state.next().is_none());
    }

    #[test]
    fn skips_part_without_name() {
        let mut state = parse(
            b"--XYZ\r\n\
              Content-Disposition: form-data; filename=\"x\"\r\n\
              \r\n\
              lost\r\n\
              --XYZ\r\n\
              Content-Disposition: form-data; name=\"kept\"\r\n\
              \r\n\
              yes\r\n\
              --XYZ--",
        );

        assert!(matches!(
            state.next(),
            Some(Err(Error::InvalidContentDisposition))
        ));

        let part = state.next().unwrap().unwrap();
        assert_eq!(part.name, "kept");
        assert_eq!(part.body, "yes");
        assert_eq!(part.index, 0);

        assert!(state.next().is_none());
        assert_eq!(state.skipped(), 1);
    }

    #[test]
    fn unsupported_content_type_keeps_part() {
        let mut state = parse(
            b"--XYZ\r\n\
              Content-Disposition: form-data; name=\"img\"; filename=\"a.png\"\r\n\
              Content-Type: image/png\r\n\
              \r\n\
              PNG\r\n\
              --XYZ--",
        );

        let part = state.next().unwrap().unwrap();
        assert_eq!(part.kind, PartKind::Untyped);
        assert_eq!(part.content_type.as_deref(), Some("image/png"));
        assert_eq!(part.body, "PNG");
    }

    #[test]
    fn unterminated_part_keeps_the_rest() {
        let mut state = parse(
            b"--XYZ\r\nContent-Disposition: form-data; name=\"done\"\r\n\r\nok\r\n\
              --XYZ\r\nContent-Disposition: form-data; name=\"open\"\r\n\r\nno end",
        );

        assert_eq!(state.next().unwrap().unwrap().body, "ok");

        let open = state.next().unwrap().unwrap();
        assert_eq!(open.index, 1);
        assert_eq!(open.name, "open");
        assert_eq!(open.body, "no end");

        assert!(state.next().is_none());
        assert!(state.eof());
        assert_eq!(state.total(), 2);
        assert_eq!(state.skipped(), 0);
    }

    #[test]
    fn no_boundary() {
        let mut state = parse(b"color=red");
        assert!(state.next().is_none());
        assert!(state.eof());
    }

    #[test]
    fn empty_delimiter_finds_nothing() {
        let mut state = State::new(Bytes::from_static(b"\r\n\r\n"), b"");
        assert!(state.next().is_none());
        assert!(state.eof());
    }
}
