//! Session identity store
//!
//! Derives and persists a pseudo-anonymous visitor session identifier in
//! client-local storage with a sliding 30-minute inactivity window. The
//! storage itself is abstracted behind [`KeyValueStore`] so hosts can back
//! it with browser local storage, a file, or memory (tests).

use crate::Result;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, error};

/// Storage key for the serialized session record
pub const SESSION_KEY: &str = "sitepulse_session";

/// Storage key for the theme preference
pub const THEME_KEY: &str = "theme";

/// Session inactivity window: 30 minutes
pub const SESSION_WINDOW_MS: i64 = 30 * 60 * 1000;

/// Minimal string key-value store, the shape of browser local storage.
pub trait KeyValueStore: Send + Sync {
    /// Read a value; `None` when the key is absent or unreadable
    fn get(&self, key: &str) -> Option<String>;
    /// Write a value, replacing any previous one
    fn put(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory key-value store for tests and ephemeral hosts
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKv {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// File-backed key-value store: one file per key under a directory.
///
/// Keys are restricted to the constants this crate writes, so no escaping
/// of key names is needed.
#[derive(Debug, Clone)]
pub struct FileKv {
    dir: PathBuf,
}

impl FileKv {
    /// Create a store rooted at `dir`, creating the directory if missing
    pub fn new<P: Into<PathBuf>>(dir: P) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }
}

impl KeyValueStore for FileKv {
    fn get(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.dir.join(key)).ok()
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        std::fs::write(self.dir.join(key), value)?;
        Ok(())
    }
}

/// Serialized session record, the one shared mutable piece of local state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct StoredSession {
    id: String,
    /// Millisecond epoch of the last page view in this session
    last_activity: i64,
}

/// Session identity store with a sliding expiration window.
///
/// A session id is stable while page views keep arriving within the
/// window; once `now - last_activity` reaches the window a new id
/// supersedes it. Sessions are never explicitly destroyed.
pub struct SessionStore<K: KeyValueStore> {
    kv: K,
    window: Duration,
}

impl<K: KeyValueStore> SessionStore<K> {
    /// Create a store with the default 30-minute window
    pub fn new(kv: K) -> Self {
        Self {
            kv,
            window: Duration::milliseconds(SESSION_WINDOW_MS),
        }
    }

    /// Create a store with a custom window
    pub fn with_window(kv: K, window: Duration) -> Self {
        Self { kv, window }
    }

    /// Get the current session id, creating a fresh session when the
    /// stored one is absent, expired, or malformed.
    ///
    /// Refreshes `last_activity` on every call that returns an existing
    /// id, which is what makes the window sliding.
    pub fn get_or_create(&self) -> String {
        self.get_or_create_at(Utc::now())
    }

    /// Clock-injected variant of [`get_or_create`](Self::get_or_create)
    pub fn get_or_create_at(&self, now: DateTime<Utc>) -> String {
        let now_ms = now.timestamp_millis();

        if let Some(raw) = self.kv.get(SESSION_KEY) {
            match serde_json::from_str::<StoredSession>(&raw) {
                Ok(mut session) => {
                    if now_ms - session.last_activity < self.window.num_milliseconds() {
                        session.last_activity = now_ms;
                        self.persist(&session);
                        return session.id;
                    }
                    debug!(session_id = %session.id, "session expired, rotating");
                }
                Err(e) => {
                    // Malformed record is treated as absent; self-heal below
                    error!("error parsing stored session: {}", e);
                }
            }
        }

        let session = StoredSession {
            id: generate_session_id(now),
            last_activity: now_ms,
        };
        self.persist(&session);
        session.id
    }

    fn persist(&self, session: &StoredSession) {
        match serde_json::to_string(session) {
            Ok(raw) => {
                if let Err(e) = self.kv.put(SESSION_KEY, &raw) {
                    error!("failed to persist session record: {}", e);
                }
            }
            Err(e) => error!("failed to serialize session record: {}", e),
        }
    }
}

/// Generate a session id: time-based prefix plus a 9-character random
/// base36 suffix. Uniqueness is best-effort, not cryptographic.
fn generate_session_id(now: DateTime<Utc>) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("session_{}_{}", now.timestamp_millis(), suffix)
}

/// Theme preference, the second piece of local persisted state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    #[default]
    Light,
}

impl Theme {
    /// Load the stored preference; unknown or missing values fall back to
    /// the default.
    pub fn load<K: KeyValueStore>(kv: &K) -> Self {
        match kv.get(THEME_KEY).as_deref() {
            Some("dark") => Self::Dark,
            Some("light") => Self::Light,
            _ => Self::default(),
        }
    }

    /// Persist this preference
    pub fn store<K: KeyValueStore>(self, kv: &K) -> Result<()> {
        let value = match self {
            Self::Dark => "dark",
            Self::Light => "light",
        };
        kv.put(THEME_KEY, value)
    }

    /// Flip between dark and light
    pub fn toggled(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_store_creates_session() {
        let store = SessionStore::new(MemoryKv::new());
        let id = store.get_or_create();
        assert!(id.starts_with("session_"));
        // prefix + millis + 9-char suffix
        assert_eq!(id.split('_').count(), 3);
        assert_eq!(id.split('_').next_back().unwrap().len(), 9);
    }

    #[test]
    fn test_session_reused_within_window() {
        let store = SessionStore::new(MemoryKv::new());
        let now = Utc::now();

        let first = store.get_or_create_at(now);
        let second = store.get_or_create_at(now + Duration::minutes(29));
        assert_eq!(first, second);
    }

    #[test]
    fn test_window_slides_on_activity() {
        let store = SessionStore::new(MemoryKv::new());
        let now = Utc::now();

        let first = store.get_or_create_at(now);
        // Each call refreshes last_activity, so repeated views keep the
        // session alive well past a single window from creation.
        let second = store.get_or_create_at(now + Duration::minutes(20));
        let third = store.get_or_create_at(now + Duration::minutes(40));
        assert_eq!(first, second);
        assert_eq!(second, third);
    }

    #[test]
    fn test_session_rotates_after_expiry() {
        let store = SessionStore::new(MemoryKv::new());
        let now = Utc::now();

        let first = store.get_or_create_at(now);
        let second = store.get_or_create_at(now + Duration::minutes(30));
        assert_ne!(first, second);
    }

    #[test]
    fn test_malformed_record_self_heals() {
        let kv = MemoryKv::new();
        kv.put(SESSION_KEY, "{not valid json").unwrap();

        let store = SessionStore::new(kv);
        let id = store.get_or_create();
        assert!(id.starts_with("session_"));
    }

    #[test]
    fn test_file_kv_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let kv = FileKv::new(dir.path()).unwrap();

        assert_eq!(kv.get(SESSION_KEY), None);
        kv.put(SESSION_KEY, "value").unwrap();
        assert_eq!(kv.get(SESSION_KEY).as_deref(), Some("value"));
    }

    #[test]
    fn test_file_backed_session_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();

        let first = {
            let store = SessionStore::new(FileKv::new(dir.path()).unwrap());
            store.get_or_create_at(now)
        };
        let store = SessionStore::new(FileKv::new(dir.path()).unwrap());
        let second = store.get_or_create_at(now + Duration::minutes(5));
        assert_eq!(first, second);
    }

    #[test]
    fn test_theme_defaults_and_roundtrip() {
        let kv = MemoryKv::new();
        assert_eq!(Theme::load(&kv), Theme::Light);

        Theme::Dark.store(&kv).unwrap();
        assert_eq!(Theme::load(&kv), Theme::Dark);

        // Garbage falls back to the default rather than erroring
        kv.put(THEME_KEY, "solarized").unwrap();
        assert_eq!(Theme::load(&kv), Theme::Light);
    }

    #[test]
    fn test_theme_toggle() {
        assert_eq!(Theme::Dark.toggled(), Theme::Light);
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
    }
}
