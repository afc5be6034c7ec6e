//! Key-value store backed by one JSON file per key.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{Error, Result};

const PREFIX: &str = "cache-";
const EXTENSION: &str = "json";

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry<T> {
    modified: f64,
    data: T,
}

/// Timestamped key-value cache in a directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

#[allow(clippy::cast_precision_loss)]
fn unix_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl CacheStore {
    /// Creates a store rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        if !is_valid_key(key) {
            return Err(Error::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{PREFIX}{key}.{EXTENSION}")))
    }

    /// Stores `value` under `key`, stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] before touching the disk if the key contains
    /// anything but ASCII alphanumerics, `_` and `-`, or an I/O error.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let path = self.entry_path(key)?;
        let entry = CacheEntry {
            modified: unix_seconds(Utc::now()),
            data: value,
        };
        fs::create_dir_all(&self.dir)?;
        fs::write(&path, serde_json::to_vec(&entry)?)?;
        debug!(key, "Cached value");
        Ok(())
    }

    /// Reads the value under `key`.
    ///
    /// With `expire_at`, an entry modified at or after that instant counts as
    /// expired and yields `None`; it stays on disk. A malformed entry is logged
    /// and treated as missing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] for an invalid key, or an I/O error other than
    /// the entry not existing.
    pub fn get<T: DeserializeOwned>(&self, key: &str, expire_at: Option<DateTime<Utc>>) -> Result<Option<T>> {
        let path = self.entry_path(key)?;
        let contents = match fs::read(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let entry = match serde_json::from_slice::<CacheEntry<Value>>(&contents) {
            Ok(entry) if entry.modified.is_finite() => entry,
            Ok(_) => {
                warn!(key, "Cache entry has an invalid 'modified' value");
                return Ok(None);
            }
            Err(err) => {
                warn!(key, "Cache entry is malformed: {err}");
                return Ok(None);
            }
        };

        if let Some(threshold) = expire_at
            && entry.modified >= unix_seconds(threshold)
        {
            debug!(key, "Cache entry expired");
            return Ok(None);
        }

        match serde_json::from_value(entry.data) {
            Ok(data) => Ok(Some(data)),
            Err(err) => {
                warn!(key, "Cache entry data has an unexpected shape: {err}");
                Ok(None)
            }
        }
    }

    /// Deletes every cache entry. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read or an entry cannot be removed.
    pub fn clear_all(&self) -> Result<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            let is_entry = path.is_file()
                && path.extension().is_some_and(|ext| ext == EXTENSION)
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(PREFIX));
            if is_entry {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        debug!(removed, "Cleared cache");
        Ok(removed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn store() -> (tempfile::TempDir, CacheStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("cache"));
        (dir, store)
    }

    #[test]
    fn test_set_get() {
        let (_dir, store) = store();
        store.set("unique-senders", &vec!["a@x", "b@x"]).unwrap();

        let value: Vec<String> = store.get("unique-senders", None).unwrap().unwrap();
        assert_eq!(value, vec!["a@x", "b@x"]);
        assert!(store.dir().join("cache-unique-senders.json").is_file());
    }

    #[test]
    fn test_missing_entry() {
        let (_dir, store) = store();
        assert!(store.get::<Value>("nothing", None).unwrap().is_none());
    }

    #[test]
    fn test_invalid_key_fails_before_io() {
        let (_dir, store) = store();
        for key in ["../escape", "has space", "dot.json", ""] {
            assert!(matches!(store.set(key, &1), Err(Error::InvalidKey(_))));
            assert!(matches!(store.get::<i32>(key, None), Err(Error::InvalidKey(_))));
        }
        assert!(!store.dir().exists());
    }

    #[test]
    fn test_expiry_threshold() {
        let (_dir, store) = store();
        store.set("k", &1).unwrap();

        let later = Utc::now() + Duration::hours(1);
        let earlier = Utc::now() - Duration::hours(1);
        assert_eq!(store.get::<i32>("k", Some(later)).unwrap(), Some(1));
        assert_eq!(store.get::<i32>("k", Some(earlier)).unwrap(), None);

        // Expired entries are not evicted.
        assert_eq!(store.get::<i32>("k", None).unwrap(), Some(1));
    }

    #[test]
    fn test_malformed_entries_are_absent() {
        let (_dir, store) = store();
        fs::create_dir_all(store.dir()).unwrap();
        let path = store.dir().join("cache-bad.json");

        for contents in [
            "not json",
            r#"{"data": 1}"#,
            r#"{"modified": "yesterday", "data": 1}"#,
            r#"{"modified": 1.0, "data": "not a number"}"#,
        ] {
            fs::write(&path, contents).unwrap();
            assert_eq!(store.get::<i32>("bad", None).unwrap(), None, "{contents}");
        }
    }

    #[test]
    fn test_clear_all() {
        let (_dir, store) = store();
        assert_eq!(store.clear_all().unwrap(), 0);

        store.set("a", &1).unwrap();
        store.set("b", &2).unwrap();
        fs::write(store.dir().join("notes.txt"), "keep").unwrap();

        assert_eq!(store.clear_all().unwrap(), 2);
        assert!(store.get::<i32>("a", None).unwrap().is_none());
        assert!(store.dir().join("notes.txt").exists());
    }
}
