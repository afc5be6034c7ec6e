//! User preferences.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::Result;

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    /// Junk folder name is empty.
    EmptyJunkFolder,
    /// Junk folder name starts or ends with whitespace.
    JunkFolderWhitespace,
}

impl SettingsError {
    /// Get human-readable error message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::EmptyJunkFolder => "Junk folder name must not be empty.",
            Self::JunkFolderWhitespace => "Junk folder name must not begin or end with whitespace.",
        }
    }
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for SettingsError {}

/// Persisted user preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Folder cleansed messages are moved to. `None` deletes them permanently.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub junk_folder: Option<String>,
}

impl Settings {
    /// File name inside the config directory.
    pub const FILE_NAME: &'static str = "settings.json";

    /// Checks the settings before they are saved or used.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> std::result::Result<(), SettingsError> {
        match self.junk_folder.as_deref() {
            Some("") => Err(SettingsError::EmptyJunkFolder),
            Some(folder) if folder.trim() != folder => Err(SettingsError::JunkFolderWhitespace),
            _ => Ok(()),
        }
    }

    /// Loads settings, falling back to defaults if the file is missing or invalid.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Self::default(),
            Err(err) => {
                warn!(path = %path.display(), "Could not read settings: {err}");
                return Self::default();
            }
        };

        let settings: Self = match serde_json::from_str(&contents) {
            Ok(settings) => settings,
            Err(err) => {
                warn!(path = %path.display(), "Settings file is malformed: {err}");
                return Self::default();
            }
        };
        if let Err(err) = settings.validate() {
            warn!("Ignoring invalid settings: {err}");
            return Self::default();
        }
        settings
    }

    /// Writes settings to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
