//! The session file format.
//!
//! A record is a run of `key|type|value;` entries with no line structure:
//!
//! ```text
//! fruit|s|apple;quantity|n|12.000000000000;organic|b|1;
//! ```
//!
//! Types are `s` (string), `n` (number, written with fixed precision) and
//! `b` (boolean, `0` or `1`). Anything but whitespace after the last complete
//! entry makes the whole file invalid.

use std::fmt;

use tracing::warn;

use crate::{Error, Result};

/// Digits after the decimal point of a written number.
pub const NUMBER_PRECISION: usize = 12;

const KEY_END: u8 = b'|';
const TYPE_END: u8 = b'|';
const VALUE_END: u8 = b';';

/// A session value.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionValue {
    /// `s`
    String(String),
    /// `n`
    Number(f64),
    /// `b`
    Boolean(bool),
}

impl SessionValue {
    /// Gets the type tag.
    pub fn tag(&self) -> char {
        match self {
            Self::String(_) => 's',
            Self::Number(_) => 'n',
            Self::Boolean(_) => 'b',
        }
    }

    fn parse(tag: &str, value: &str) -> Result<Self> {
        match tag {
            "s" => Ok(Self::String(value.to_string())),
            "n" => value
                .trim()
                .parse()
                .map(Self::Number)
                .map_err(|_| Error::InvalidSessionData),
            "b" => value
                .trim()
                .parse::<i64>()
                .map(|n| Self::Boolean(n != 0))
                .map_err(|_| Error::InvalidSessionData),
            _ => Err(Error::InvalidSessionData),
        }
    }
}

impl fmt::Display for SessionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{:.*}", NUMBER_PRECISION, n),
            Self::Boolean(b) => write!(f, "{}", u8::from(*b)),
        }
    }
}

impl From<String> for SessionValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for SessionValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<f64> for SessionValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for SessionValue {
    fn from(n: i32) -> Self {
        Self::Number(n.into())
    }
}

impl From<bool> for SessionValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

/// The key/value set of one session, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionRecord {
    entries: Vec<(String, SessionValue)>,
}

impl SessionRecord {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a key, keeping its position if it already exists.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<SessionValue>,
    ) -> Option<SessionValue> {
        let key = key.into();
        let value = value.into();

        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => Some(std::mem::replace(v, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Gets a value.
    pub fn get(&self, key: &str) -> Option<&SessionValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Removes a key.
    pub fn remove(&mut self, key: &str) -> Option<SessionValue> {
        let i = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(i).1)
    }

    /// Counts the entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SessionValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Writes every entry the format can carry.
    ///
    /// A key containing `|` or a string containing `;` cannot be read back;
    /// such entries are logged and left out.
    pub fn encode(&self) -> String {
        let mut out = String::new();

        for (key, value) in self.iter() {
            let unsupported = key.as_bytes().contains(&KEY_END)
                || matches!(value, SessionValue::String(s) if s.as_bytes().contains(&VALUE_END));

            if unsupported {
                warn!("unsupported session entry `{}`, skipped", key);
                continue;
            }

            out.push_str(key);
            out.push(char::from(KEY_END));
            out.push(value.tag());
            out.push(char::from(TYPE_END));
            out.push_str(&value.to_string());
            out.push(char::from(VALUE_END));
        }

        out
    }

    /// Reads a whole session file.
    ///
    /// The input is valid only if it ends, modulo trailing whitespace, right
    /// after a complete entry. There is no partial result.
    pub fn decode(input: &[u8]) -> Result<Self> {
        let input = std::str::from_utf8(input).map_err(|_| Error::InvalidSessionData)?;
        let bytes = input.as_bytes();

        let mut record = Self::new();
        let mut scan = Scan::Key;
        let mut start = 0;
        let mut key = 0..0;
        let mut tag = 0..0;

        for (i, b) in bytes.iter().enumerate() {
            match (scan, *b) {
                (Scan::Key, KEY_END) => {
                    key = start..i;
                    start = i + 1;
                    scan = Scan::Type;
                }
                (Scan::Type, TYPE_END) => {
                    tag = start..i;
                    start = i + 1;
                    scan = Scan::Value;
                }
                (Scan::Value, VALUE_END) => {
                    let value = SessionValue::parse(&input[tag.clone()], &input[start..i])?;
                    record.insert(&input[key.clone()], value);

                    start = i + 1;
                    scan = Scan::Key;

                    if bytes[start..].iter().all(u8::is_ascii_whitespace) {
                        return Ok(record);
                    }
                }
                _ => {}
            }
        }

        Err(Error::InvalidSessionData)
    }
}

#[derive(Debug, Clone, Copy)]
enum Scan {
    Key,
    Type,
    Value,
}

impl<K, V> FromIterator<(K, V)> for SessionRecord
where
    K: Into<String>,
    V: Into<SessionValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::{SessionRecord, SessionValue};
    use crate::Error;

    fn fruit() -> SessionRecord {
        [
            ("fruit", SessionValue::from("apple")),
            ("type", "granny smith".into()),
            ("quantity", 12.into()),
            ("organic", true.into()),
            ("price", 3.95.into()),
            ("fresh", false.into()),
            ("empty", "".into()),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn encodes_in_insertion_order() {
        assert_eq!(
            fruit().encode(),
            "fruit|s|apple;type|s|granny smith;quantity|n|12.000000000000;organic|b|1;\
             price|n|3.950000000000;fresh|b|0;empty|s|;"
        );
    }

    #[test]
    fn round_trip() {
        let record = fruit();
        assert_eq!(SessionRecord::decode(record.encode().as_bytes()).unwrap(), record);
    }

    #[test]
    fn trailing_whitespace_is_fine() {
        let record = SessionRecord::decode(b"a|s|x;b|b|1;\n  \t").unwrap();
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("b"), Some(&SessionValue::Boolean(true)));
    }

    #[test]
    fn trailing_garbage_invalidates_everything() {
        assert!(matches!(
            SessionRecord::decode(b"a|s|x;b|n|2;garbage"),
            Err(Error::InvalidSessionData)
        ));
        assert!(matches!(
            SessionRecord::decode(b"a|s|x;b|n|2"),
            Err(Error::InvalidSessionData)
        ));
        assert!(matches!(
            SessionRecord::decode(b"a|q|x;"),
            Err(Error::InvalidSessionData)
        ));
        assert!(matches!(
            SessionRecord::decode(b"a|ss|x;"),
            Err(Error::InvalidSessionData)
        ));
        assert!(matches!(
            SessionRecord::decode(b"n|n|twelve;"),
            Err(Error::InvalidSessionData)
        ));
        assert!(SessionRecord::decode(b"").is_err());
    }

    #[test]
    fn later_keys_win() {
        let record = SessionRecord::decode(b"a|s|x;a|s|y;").unwrap();
        assert_eq!(record.len(), 1);
        assert_eq!(record.get("a"), Some(&SessionValue::String("y".into())));
    }

    #[test]
    fn skips_entries_it_cannot_carry() {
        let mut record = SessionRecord::new();
        record.insert("ok", "fine");
        record.insert("bad|key", "x");
        record.insert("bad_value", "a;b");
        record.insert("pipe", "a|b");

        assert_eq!(record.encode(), "ok|s|fine;pipe|s|a|b;");
        assert_eq!(
            SessionRecord::decode(record.encode().as_bytes())
                .unwrap()
                .get("pipe"),
            Some(&SessionValue::String("a|b".into()))
        );
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut record = SessionRecord::new();
        record.insert("a", 1);
        record.insert("b", 2);
        assert_eq!(record.insert("a", 3), Some(SessionValue::Number(1.0)));
        assert_eq!(record.iter().map(|(k, _)| k).collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(record.remove("a"), Some(SessionValue::Number(3.0)));
        assert_eq!(record.len(), 1);
    }
}
