//! Session token persistence.
//!
//! The token is kept in a small key/value store under a fixed key, so a
//! restarted client can resume the session with a status probe.

use crate::error::{ApiError, ApiResult};
use serde_json::{Map, Value as JsonValue};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// Key the session token is stored under.
pub const TOKEN_KEY: &str = "session_token";

/// Storage for the bearer token.
pub trait TokenStore: Send + Sync {
    /// Read the stored token, if any.
    fn get(&self) -> Option<String>;

    /// Store a token, replacing any previous one.
    fn set(&self, token: &str) -> ApiResult<()>;

    /// Remove the stored token.
    fn clear(&self) -> ApiResult<()>;
}

/// Process-local token storage.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<String> {
        self.token.read().ok().and_then(|t| t.clone())
    }

    fn set(&self, token: &str) -> ApiResult<()> {
        let mut guard = self
            .token
            .write()
            .map_err(|_| ApiError::storage("Token lock poisoned"))?;
        *guard = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> ApiResult<()> {
        let mut guard = self
            .token
            .write()
            .map_err(|_| ApiError::storage("Token lock poisoned"))?;
        *guard = None;
        Ok(())
    }
}

/// Token storage backed by a JSON document on disk.
///
/// Other keys in the document are preserved. A missing or unreadable file
/// reads as "no token".
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Map<String, JsonValue> {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|content| serde_json::from_str::<JsonValue>(&content).ok())
            .and_then(|value| match value {
                JsonValue::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_default()
    }

    fn save(&self, map: &Map<String, JsonValue>) -> ApiResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<String> {
        let _guard = self.lock.read().ok()?;
        self.load()
            .get(TOKEN_KEY)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from)
    }

    fn set(&self, token: &str) -> ApiResult<()> {
        let _guard = self
            .lock
            .write()
            .map_err(|_| ApiError::storage("Token lock poisoned"))?;
        let mut map = self.load();
        map.insert(TOKEN_KEY.to_string(), JsonValue::String(token.to_string()));
        self.save(&map)?;
        debug!(path = %self.path.display(), "Session token stored");
        Ok(())
    }

    fn clear(&self) -> ApiResult<()> {
        let _guard = self
            .lock
            .write()
            .map_err(|_| ApiError::storage("Token lock poisoned"))?;
        let mut map = self.load();
        if map.remove(TOKEN_KEY).is_some() {
            self.save(&map)?;
            debug!(path = %self.path.display(), "Session token cleared");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryTokenStore::new();
        assert!(store.get().is_none());
        store.set("abc").unwrap();
        assert_eq!(store.get().as_deref(), Some("abc"));
        store.clear().unwrap();
        assert!(store.get().is_none());
    }

    #[test]
    fn test_file_store_uses_fixed_key_and_keeps_other_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("client.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"theme":"dark"}"#).unwrap();

        let store = FileTokenStore::new(&path);
        store.set("tok-1").unwrap();

        let raw: JsonValue = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[TOKEN_KEY], "tok-1");
        assert_eq!(raw["theme"], "dark");

        store.clear().unwrap();
        assert!(store.get().is_none());
        let raw: JsonValue = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["theme"], "dark");
    }

    #[test]
    fn test_file_store_missing_or_corrupt_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("none.json"));
        assert!(store.get().is_none());
        assert!(store.clear().is_ok());

        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, "not json").unwrap();
        assert!(FileTokenStore::new(&corrupt).get().is_none());
    }

    #[test]
    fn test_file_store_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("a").join("b").join("t.json"));
        store.set("x").unwrap();
        assert_eq!(store.get().as_deref(), Some("x"));
    }
}
