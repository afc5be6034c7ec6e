//! Versioned persisted session config.
//!
//! Current shape (version "2"):
//!
//! ```json
//! {"version": "2", "accounts": [{"id": "…", "kind": "oauth", "data": {…}}], "active": "…"}
//! ```
//!
//! Version "1" held a single bare `{kind, data}` (`class` in older files) and is
//! upgraded by wrapping it as the only account, with id `"0"`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::session::Session;
use crate::{Error, Result};

/// Version written by this build.
pub const CONFIG_VERSION: &str = "2";

/// Id given to the account migrated out of a version "1" file.
const MIGRATED_ID: &str = "0";

/// One stored account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountEntry {
    /// Stable account id.
    pub id: String,
    /// Session kind name (see [`SessionKind`](crate::SessionKind)).
    #[serde(alias = "class")]
    pub kind: String,
    /// Account address, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Serialized session.
    pub data: Value,
}

/// The persisted session config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Format version. Older writers stored it as a number.
    #[serde(deserialize_with = "version_string")]
    pub version: String,
    /// Stored accounts.
    #[serde(default)]
    pub accounts: Vec<AccountEntry>,
    /// Id of the account to sign in with.
    #[serde(default)]
    pub active: Option<String>,
}

fn version_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(version) => version,
        Raw::Number(version) => version.to_string(),
    })
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            accounts: Vec::new(),
            active: None,
        }
    }
}

impl ServiceConfig {
    /// Reads the declared version. A document without one is version "1".
    ///
    /// # Errors
    ///
    /// Returns a config error if the document is not an object or the version
    /// is neither a string nor a number.
    pub fn version_of(config: &Value) -> Result<String> {
        let object = config
            .as_object()
            .ok_or_else(|| Error::Config("service configuration is not a map".into()))?;
        match object.get("version") {
            None | Some(Value::Null) => Ok("1".to_string()),
            Some(Value::String(version)) => Ok(version.clone()),
            Some(Value::Number(version)) => Ok(version.to_string()),
            Some(other) => Err(Error::Config(format!("invalid config version {other}"))),
        }
    }

    /// Brings a document of any known version to the current shape.
    ///
    /// # Errors
    ///
    /// Returns a config error for unknown versions or documents that are not maps.
    pub fn normalize(config: Value) -> Result<Value> {
        let mut config = config;
        loop {
            match Self::version_of(&config)?.as_str() {
                "1" => config = normalize_v1(&config),
                CONFIG_VERSION => return Ok(config),
                other => {
                    return Err(Error::Config(format!("Unsupported config version '{other}'")));
                }
            }
        }
    }

    /// Parses a document of any known version.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be normalized or has the wrong shape.
    pub fn from_value(config: Value) -> Result<Self> {
        let config = Self::normalize(config)?;
        Ok(serde_json::from_value(config)?)
    }

    /// Returns the account with the given id.
    #[must_use]
    pub fn entry(&self, id: &str) -> Option<&AccountEntry> {
        self.accounts.iter().find(|entry| entry.id == id)
    }

    /// Returns the active account.
    #[must_use]
    pub fn active_entry(&self) -> Option<&AccountEntry> {
        self.active.as_deref().and_then(|id| self.entry(id))
    }

    /// Stores a freshly authorized session and makes it active.
    ///
    /// An existing entry for the same user and kind is replaced in place. The
    /// stored entry always gets a new id.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be serialized.
    pub fn record_session(&mut self, session: &Session) -> Result<&AccountEntry> {
        let kind = session.kind();
        let user = session.user();
        let entry = AccountEntry {
            id: Uuid::new_v4().to_string(),
            kind: kind.as_str().to_string(),
            user: Some(user.to_string()),
            data: session.serialize()?,
        };

        let existing = self.accounts.iter().position(|entry| {
            entry.session_kind() == Some(kind) && entry_user(entry) == Some(user)
        });
        self.active = Some(entry.id.clone());
        self.version = CONFIG_VERSION.to_string();

        let index = if let Some(index) = existing {
            debug!(user, "Replacing stored account");
            self.accounts[index] = entry;
            index
        } else {
            info!(user, "Storing new account");
            self.accounts.push(entry);
            self.accounts.len() - 1
        };
        Ok(&self.accounts[index])
    }

    /// Re-serializes the active account after reconstruction.
    ///
    /// Reconstruction may refresh secrets (for example an OAuth access token);
    /// this keeps the stored copy current. Returns false if there is no active
    /// account.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be serialized.
    pub fn refresh_active(&mut self, session: &Session) -> Result<bool> {
        let data = session.serialize()?;
        let active = self.active.clone();
        let Some(entry) = self
            .accounts
            .iter_mut()
            .find(|entry| Some(&entry.id) == active.as_ref())
        else {
            return Ok(false);
        };
        entry.data = data;
        entry.user = Some(session.user().to_string());
        Ok(true)
    }

    /// Serializes to the current document shape.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Address an entry belongs to. Older files only carry it inside credential data.
fn entry_user(entry: &AccountEntry) -> Option<&str> {
    entry
        .user
        .as_deref()
        .or_else(|| entry.data.get("user").and_then(Value::as_str))
}

/// `{kind|class, data}` becomes the single account of a version "2" document.
fn normalize_v1(config: &Value) -> Value {
    let mut account = Map::new();
    account.insert("id".into(), json!(MIGRATED_ID));
    if let Some(kind) = config.get("kind").or_else(|| config.get("class")) {
        account.insert("kind".into(), kind.clone());
    }
    if let Some(data) = config.get("data") {
        account.insert("data".into(), data.clone());
    }

    json!({
        "version": CONFIG_VERSION,
        "accounts": [account],
        "active": MIGRATED_ID,
    })
}

/// Reads and writes the config file.
#[derive(Debug, Clone)]
pub struct ServiceConfigStore {
    path: PathBuf,
}

impl ServiceConfigStore {
    /// File name inside the config directory.
    pub const FILE_NAME: &'static str = "service_config.json";

    /// Creates a store for the given file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a store for [`Self::FILE_NAME`] inside `dir`.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(Self::FILE_NAME))
    }

    /// Path of the config file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the raw document.
    ///
    /// A missing file, unreadable file, invalid JSON or non-object yields `None`.
    #[must_use]
    pub fn load(&self) -> Option<Value> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No service configuration");
                return None;
            }
            Err(err) => {
                warn!(path = %self.path.display(), "Could not read service configuration: {err}");
                return None;
            }
        };

        match serde_json::from_str::<Value>(&contents) {
            Ok(value) if value.is_object() => Some(value),
            Ok(_) => {
                warn!("Service configuration file exists and contains valid JSON, but is not a map");
                None
            }
            Err(err) => {
                warn!("Service configuration file exists, but is not valid JSON: {err}");
                None
            }
        }
    }

    /// Writes the config.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, config: &ServiceConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(config)?)?;
        debug!(path = %self.path.display(), "Saved service configuration");
        Ok(())
    }

    /// Deletes the config file. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::session::{CredentialSession, Session};
    use crate::testing::{FakeAuthority, FakeServer};

    fn credential_session(server: &FakeServer, user: &str, password: &str) -> Session {
        let ctx = server.context(FakeAuthority::new(user));
        CredentialSession::connect(user, password, "imap.example.com", 993, &ctx)
            .unwrap()
            .into()
    }

    #[test]
    fn test_migrate_v1() {
        let v1 = json!({"kind": "credential", "data": {"user": "a@x"}});
        let migrated = ServiceConfig::normalize(v1).unwrap();
        assert_eq!(
            migrated,
            json!({
                "version": "2",
                "accounts": [{"id": "0", "kind": "credential", "data": {"user": "a@x"}}],
                "active": "0",
            })
        );
    }

    #[test]
    fn test_migrate_v1_legacy_class() {
        let v1 = json!({"version": "1", "class": "GmailIMAP", "data": {"token": "t"}});
        let config = ServiceConfig::from_value(v1).unwrap();
        assert_eq!(config.accounts[0].kind, "GmailIMAP");
        assert_eq!(config.active_entry().unwrap().id, "0");
    }

    #[test]
    fn test_numeric_version() {
        let config = json!({"version": 2, "accounts": [], "active": null});
        assert_eq!(ServiceConfig::version_of(&config).unwrap(), "2");
        let parsed = ServiceConfig::from_value(config).unwrap();
        assert!(parsed.accounts.is_empty());
        assert_eq!(parsed.version, CONFIG_VERSION);
    }

    #[test]
    fn test_unknown_version() {
        let err = ServiceConfig::from_value(json!({"version": "7"})).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(ServiceConfig::version_of(&json!("string")).is_err());
    }

    #[test]
    fn test_record_session_upserts() {
        let server = FakeServer::new();
        let mut config = ServiceConfig::default();

        let first = credential_session(&server, "a@x", "one");
        let first_id = config.record_session(&first).unwrap().id.clone();
        let other = credential_session(&server, "b@x", "two");
        config.record_session(&other).unwrap();
        assert_eq!(config.accounts.len(), 2);

        let again = credential_session(&server, "a@x", "three");
        let entry = config.record_session(&again).unwrap().clone();
        assert_eq!(config.accounts.len(), 2);
        assert_ne!(entry.id, first_id);
        assert_eq!(config.active.as_deref(), Some(entry.id.as_str()));
        assert_eq!(config.accounts[0], entry);
        assert_eq!(entry.data["password"], "three");
    }

    #[test]
    fn test_record_session_matches_legacy_entry() {
        let server = FakeServer::new();
        let mut config = ServiceConfig::from_value(json!({
            "class": "ManualIMAP",
            "data": {"user": "a@x", "password": "old", "host": "imap.example.com"},
        }))
        .unwrap();

        config.record_session(&credential_session(&server, "a@x", "new")).unwrap();
        assert_eq!(config.accounts.len(), 1);
        assert_eq!(config.accounts[0].kind, "credential");
    }

    #[test]
    fn test_refresh_active() {
        let server = FakeServer::new();
        let mut config = ServiceConfig::default();
        let session = credential_session(&server, "a@x", "one");
        assert!(!config.refresh_active(&session).unwrap());

        config.record_session(&session).unwrap();
        config.accounts[0].data = json!({});
        assert!(config.refresh_active(&session).unwrap());
        assert_eq!(config.accounts[0].data["user"], "a@x");
    }

    #[test]
    fn test_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ServiceConfigStore::in_dir(&dir.path().join("nested"));
        assert!(store.load().is_none());

        let server = FakeServer::new();
        let mut config = ServiceConfig::default();
        config.record_session(&credential_session(&server, "a@x", "pw")).unwrap();
        store.save(&config).unwrap();

        let loaded = ServiceConfig::from_value(store.load().unwrap()).unwrap();
        assert_eq!(loaded, config);

        store.remove().unwrap();
        assert!(store.load().is_none());
        store.remove().unwrap();
    }

    #[test]
    fn test_store_rejects_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let store = ServiceConfigStore::in_dir(dir.path());

        fs::write(store.path(), "{not json").unwrap();
        assert!(store.load().is_none());

        fs::write(store.path(), "[1, 2]").unwrap();
        assert!(store.load().is_none());
    }
}
