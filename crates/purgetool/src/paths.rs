//! Per-user directories.

use std::path::PathBuf;

use purgetool_core::{ServiceConfigStore, Settings};

const APP_DIR: &str = "purgetool";

/// Where purgetool keeps its files.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Settings and session config.
    pub config_dir: PathBuf,
    /// Cache entries.
    pub cache_dir: PathBuf,
    /// Log file.
    pub data_dir: PathBuf,
}

impl Paths {
    /// Resolves the platform directories, falling back to the working directory.
    pub fn resolve() -> Self {
        let base = |dir: Option<PathBuf>| dir.unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR);
        Self {
            config_dir: base(dirs::config_dir()),
            cache_dir: base(dirs::cache_dir()),
            data_dir: base(dirs::data_dir()),
        }
    }

    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join(Settings::FILE_NAME)
    }

    pub fn service_config(&self) -> ServiceConfigStore {
        ServiceConfigStore::in_dir(&self.config_dir)
    }

    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("run.log")
    }
}
