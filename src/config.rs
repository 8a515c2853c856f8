use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::store::{DEFAULT_SLOT, FileBackend, ProjectStore};

pub const CONFIG_VERSION: u64 = 1;

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("taskboard")
}

fn default_slot() -> String {
    DEFAULT_SLOT.to_string()
}

fn default_version() -> u64 {
    CONFIG_VERSION
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_version")]
    pub version: u64,
    #[serde(default = "default_data_dir")]
    pub data_directory: PathBuf,
    /// Name of the slot holding the project collection.
    #[serde(default = "default_slot")]
    pub slot: String,
    #[serde(default)]
    pub debug_logging: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            data_directory: default_data_dir(),
            slot: default_slot(),
            debug_logging: false,
        }
    }
}

impl StoreConfig {
    /// Default location of the config file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("taskboard")
            .join("config.json")
    }

    /// Read a JSON config file. A missing or unreadable file yields defaults.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                return Self::default();
            }
            Err(e) => {
                log::warn!("Failed to read config {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str::<Self>(&content) {
            Ok(mut config) => {
                if config.slot.trim().is_empty() {
                    log::warn!("Config slot name is blank, using '{}'", DEFAULT_SLOT);
                    config.slot = default_slot();
                }
                config
            }
            Err(e) => {
                log::warn!("Invalid config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    pub fn slot_path(&self) -> PathBuf {
        self.backend().slot_path(&self.slot)
    }

    pub fn backend(&self) -> FileBackend {
        FileBackend::new(&self.data_directory)
    }

    /// Ensure the data directory exists.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_directory)
    }

    /// Open the file-backed store this config describes.
    pub fn open_store(&self) -> ProjectStore<FileBackend> {
        ProjectStore::open(self.backend(), self.slot.clone())
    }
}
