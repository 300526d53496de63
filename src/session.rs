use rand::{rngs::OsRng, RngCore};
use tracing::{debug, warn};

use crate::{Config, Error, Result, SessionRecord, SessionStore};

/// Random bytes drawn for one identifier, one symbol each.
pub const TOKEN_LENGTH: usize = 32;

/// Symbols of the identifier token. Bytes are mapped by `%`, so the
/// distribution is not uniform.
const ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// A source of cryptographically secure random bytes.
pub trait CsprngSource {
    /// Fills `dest` entirely.
    fn fill(&mut self, dest: &mut [u8]) -> Result<()>;
}

/// The operating system entropy source.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl CsprngSource for OsRandom {
    fn fill(&mut self, dest: &mut [u8]) -> Result<()> {
        OsRng.try_fill_bytes(dest)?;
        Ok(())
    }
}

/// The session of the current request.
///
/// No identifier is held until [`Session::start`] recovers one from the
/// client cookie or [`Session::create`] mints a fresh one.
#[derive(Debug)]
pub struct Session<R = OsRandom> {
    id: Option<String>,
    store: SessionStore,
    prefix: String,
    cookie_name: String,
    rng: R,
}

impl Session<OsRandom> {
    /// Creates new Session.
    pub fn new(config: &Config) -> Self {
        Self::with_rng(config, OsRandom)
    }
}

impl<R> Session<R>
where
    R: CsprngSource,
{
    /// Creates new Session with a custom entropy source.
    pub fn with_rng(config: &Config, rng: R) -> Self {
        Self {
            id: None,
            store: SessionStore::new(&config.session_dir),
            prefix: config.session_prefix.clone(),
            cookie_name: config.cookie_name.clone(),
            rng,
        }
    }

    /// Gets the store.
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Gets the length of every identifier.
    pub fn id_length(&self) -> usize {
        self.prefix.len() + TOKEN_LENGTH
    }

    /// Gets the identifier, if a session is active.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Checks if a session is active.
    pub fn status(&self) -> bool {
        self.id.is_some()
    }

    /// Resumes the session named by the cookie header.
    ///
    /// The last cookie with the session name wins. Its value must carry the
    /// identifier prefix followed by alphanumerics only, be at least as long
    /// as an identifier, and name an existing session file.
    ///
    /// With a session already active, this only refreshes the access time of
    /// its file.
    pub fn start(&mut self, cookie: Option<&str>) -> bool {
        if let Some(id) = &self.id {
            return match self.store.touch(id) {
                Ok(()) => true,
                Err(e) => {
                    warn!("failed to update access time of session {}: {}", id, e);
                    false
                }
            };
        }

        match cookie
            .ok_or(Error::InvalidSessionId)
            .and_then(|cookie| self.recover(cookie))
        {
            Ok(id) => {
                debug!("session {} resumed", id);
                self.id.replace(id);
                true
            }
            Err(e) => {
                debug!("no active session: {}", e);
                false
            }
        }
    }

    /// Starts a session under a fresh identifier.
    ///
    /// Its file is only written by the first [`Session::set_data`].
    pub fn create(&mut self) -> bool {
        match self.generate() {
            Ok(id) => {
                debug!("session {} created", id);
                self.id.replace(id);
                true
            }
            Err(e) => {
                warn!("failed to create session: {}", e);
                false
            }
        }
    }

    /// Mints an identifier: the prefix, then one symbol per random byte.
    pub fn generate(&mut self) -> Result<String> {
        let mut bytes = [0u8; TOKEN_LENGTH];
        self.rng.fill(&mut bytes)?;

        let mut id = String::with_capacity(self.id_length());
        id.push_str(&self.prefix);
        id.extend(
            bytes
                .iter()
                .map(|b| char::from(ALPHABET[usize::from(*b) % ALPHABET.len()])),
        );

        Ok(id)
    }

    /// Loads the record of the active session.
    ///
    /// Returns `None` without a session; an unreadable or invalid file reads
    /// as an empty record.
    pub fn get_data(&self) -> Option<SessionRecord> {
        let id = self.id.as_deref()?;

        Some(self.store.read(id).unwrap_or_else(|e| {
            warn!("failed to read session {}: {}", id, e);
            SessionRecord::new()
        }))
    }

    /// Saves the record of the active session.
    pub fn set_data(&self, record: &SessionRecord) -> bool {
        let res = self
            .id
            .as_deref()
            .ok_or(Error::SessionNotStarted)
            .and_then(|id| self.store.write(id, record));

        match res {
            Ok(()) => true,
            Err(e) => {
                warn!("failed to save session: {}", e);
                false
            }
        }
    }

    /// Ends the active session and deletes its file.
    pub fn destroy(&mut self) -> bool {
        let Some(id) = self.id.take() else {
            return false;
        };

        if let Err(e) = self.store.remove(&id) {
            debug!("session {} had no file: {}", id, e);
        }

        true
    }

    fn recover(&self, cookie: &str) -> Result<String> {
        let value = cookie
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(name, _)| *name == self.cookie_name)
            .map(|(_, value)| value.trim())
            .last()
            .ok_or(Error::InvalidSessionId)?;

        self.validate(value)?;

        if !self.store.exists(value) {
            return Err(Error::InvalidSessionId);
        }

        Ok(value.to_string())
    }

    fn validate(&self, value: &str) -> Result<()> {
        if value.len() < self.id_length() {
            return Err(Error::InvalidSessionId);
        }

        value
            .strip_prefix(self.prefix.as_str())
            .filter(|token| token.bytes().all(|b| b.is_ascii_alphanumeric()))
            .map(|_| ())
            .ok_or(Error::InvalidSessionId)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{CsprngSource, Session, TOKEN_LENGTH};
    use crate::{Config, Error, Result};

    /// Counts up from a seed.
    struct Counter(u8);

    impl CsprngSource for Counter {
        fn fill(&mut self, dest: &mut [u8]) -> Result<()> {
            for b in dest {
                *b = self.0;
                self.0 = self.0.wrapping_add(1);
            }
            Ok(())
        }
    }

    struct Broken;

    impl CsprngSource for Broken {
        fn fill(&mut self, _: &mut [u8]) -> Result<()> {
            Err(Error::Stream(std::io::ErrorKind::Other.into()))
        }
    }

    #[test]
    fn maps_bytes_modulo_alphabet() {
        let mut session = Session::with_rng(&Config::default(), Counter(60));
        let id = session.generate().unwrap();

        assert_eq!(id.len(), 8 + TOKEN_LENGTH);
        // 60, 61, 62, 63, ... wrap around the 62 symbols
        assert!(id.starts_with("jst_sessYZ01"));
    }

    #[test]
    fn modulo_bias_is_kept() {
        let mut session = Session::with_rng(&Config::default(), Counter(248));
        // 248 % 62 == 0 .. 255 % 62 == 7, then 0 % 62 == 0
        assert!(session.generate().unwrap().starts_with("jst_sess012345670"));
    }

    #[test]
    fn entropy_failure_leaves_no_session() {
        let mut session = Session::with_rng(&Config::default(), Broken);
        assert!(!session.create());
        assert!(!session.status());
        assert_eq!(session.id(), None);
    }

    #[test]
    fn unique_identifiers() {
        let mut session = Session::new(&Config::default());
        let ids = (0..10_000)
            .map(|_| session.generate().unwrap())
            .collect::<HashSet<_>>();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn validates_shape() {
        let session = Session::new(&Config::default());
        let token = "a".repeat(TOKEN_LENGTH);

        assert!(session.validate(&format!("jst_sess{token}")).is_ok());
        assert!(session.validate(&format!("jst_sess{token}Z9")).is_ok());
        assert!(session.validate(&format!("jst_sess{}", &token[1..])).is_err());
        assert!(session.validate(&format!("jst_sess{}-", &token[1..])).is_err());
        assert!(session.validate(&format!("jst_sess{token}/../x")).is_err());
        assert!(session.validate(&format!("../../..{token}")).is_err());
    }
}
