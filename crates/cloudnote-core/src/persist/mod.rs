//! Durable JSON documents: the metadata projection and the settings store.
//!
//! Both are whole-document stores. Every save rewrites the full document
//! through a sibling temp file that is renamed over the target.

mod metadata;
mod settings_store;

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Error, Result};

pub use metadata::{JsonMetadataStore, MemoryMetadataStore, MetadataStore};
pub use settings_store::{JsonSettingsStore, SettingsRepository};

/// File name of the metadata document inside the data directory.
pub const METADATA_FILE_NAME: &str = "files-data.json";

/// File name of the settings document inside the config directory.
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Read a JSON document, returning `None` when the file does not exist.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(Error::filesystem(path, error)),
    };
    Ok(Some(serde_json::from_str(&raw)?))
}

/// Overwrite a JSON document as a whole.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|error| Error::filesystem(parent, error))?;
    }

    let serialized = serde_json::to_string_pretty(value)?;
    let temp_path = temp_path_for(path);
    std::fs::write(&temp_path, serialized).map_err(|error| Error::filesystem(&temp_path, error))?;
    std::fs::rename(&temp_path, path).map_err(|error| Error::filesystem(path, error))
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
