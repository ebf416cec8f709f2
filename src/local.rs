//! Local Cache: synchronous, always-available fallback storage
//!
//! One JSON file per fixed key inside the state directory. Reads treat a corrupt
//! file as absent; writes log failures instead of returning them.

use crate::model::Store;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};

/// Key holding the serialized tag store
pub const STORE_KEY: &str = "tag-data";
/// Key holding `{token, gistId}`
pub const SETTINGS_KEY: &str = "gist-settings";

#[derive(Debug, Clone)]
pub struct LocalCache {
    dir: PathBuf,
}

impl LocalCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Read and parse a key; `None` if missing or unreadable
    pub fn load_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.key_path(key);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read local cache");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "ignoring corrupt local cache entry");
                None
            }
        }
    }

    /// Serialize and write a key, replacing what was there
    pub fn save_json<T: Serialize>(&self, key: &str, value: &T) {
        if let Err(e) = self.try_save_json(key, value) {
            tracing::error!(key, error = %e, "failed to write local cache");
        }
    }

    fn try_save_json<T: Serialize>(&self, key: &str, value: &T) -> io::Result<()> {
        let content = serde_json::to_string_pretty(value)?;
        std::fs::create_dir_all(&self.dir)?;
        let path = self.key_path(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &path)
    }

    pub fn remove(&self, key: &str) {
        match std::fs::remove_file(self.key_path(key)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(key, error = %e, "failed to remove local cache entry"),
        }
    }

    pub fn load(&self) -> Option<Store> {
        let mut store: Store = self.load_json(STORE_KEY)?;
        store.normalize();
        tracing::debug!(tags = store.tags.len(), "loaded tag data from local cache");
        Some(store)
    }

    pub fn save(&self, store: &Store) {
        self.save_json(STORE_KEY, store);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Tag;

    #[test]
    fn test_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path());
        assert!(cache.load().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path().join("nested"));

        let mut store = Store::default();
        let tag = Tag::new("SRE");
        store.tags.insert(tag.id.clone(), tag);
        store
            .assignments
            .insert("sre-next-2025".to_string(), vec!["sre".to_string()]);
        store.touch();

        cache.save(&store);
        assert_eq!(cache.load(), Some(store));
        assert!(!cache.key_path(STORE_KEY).with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path());
        std::fs::write(cache.key_path(STORE_KEY), "{\"tags\": [oops").unwrap();
        assert!(cache.load().is_none());
    }

    #[test]
    fn test_save_failure_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the cache directory should be
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, "x").unwrap();
        let cache = LocalCache::new(&blocker);
        cache.save(&Store::default());
        assert!(cache.load().is_none());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path());
        cache.save_json(SETTINGS_KEY, &serde_json::json!({"token": "t"}));
        cache.remove(SETTINGS_KEY);
        cache.remove(SETTINGS_KEY);
        assert!(cache.load_json::<serde_json::Value>(SETTINGS_KEY).is_none());
    }
}
