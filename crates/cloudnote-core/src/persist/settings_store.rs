//! Settings store implementation

use std::path::{Path, PathBuf};

use super::{read_json, write_json};
use crate::error::Result;
use crate::models::SyncSettings;

/// Trait for settings storage operations
pub trait SettingsRepository {
    /// Load settings, falling back to defaults when nothing was saved yet
    fn load(&self) -> Result<SyncSettings>;

    /// Save settings
    fn save(&self, settings: &SyncSettings) -> Result<()>;
}

/// JSON file implementation of `SettingsRepository`
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsRepository for JsonSettingsStore {
    fn load(&self) -> Result<SyncSettings> {
        Ok(read_json(&self.path)?.unwrap_or_default())
    }

    fn save(&self, settings: &SyncSettings) -> Result<()> {
        write_json(&self.path, settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, JsonSettingsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSettingsStore::new(dir.path().join("config").join("settings.json"));
        (dir, store)
    }

    #[test]
    fn test_load_default_settings() {
        let (_dir, store) = setup();
        let settings = store.load().unwrap();
        assert!(!settings.is_sync_configured());
        assert!(!settings.enable_auto_sync);
    }

    #[test]
    fn test_save_and_load_settings() {
        let (_dir, store) = setup();

        let settings = SyncSettings {
            access_key: Some("AKID".to_string()),
            secret_key: Some("SECRET".to_string()),
            bucket_name: Some("notes".to_string()),
            enable_auto_sync: true,
            saved_file_location: Some(PathBuf::from("/home/me/notes")),
            ..SyncSettings::default()
        };

        store.save(&settings).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, settings);
        assert!(loaded.is_auto_sync());
    }

    #[test]
    fn test_unknown_fields_tolerated_missing_fields_defaulted() {
        let (_dir, store) = setup();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), r#"{"bucket_name": "b", "theme": "dark"}"#).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.bucket_name.as_deref(), Some("b"));
        assert!(loaded.access_key.is_none());
    }
}
