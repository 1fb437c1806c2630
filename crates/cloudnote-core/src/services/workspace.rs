//! Data directory wiring shared by clients.

use std::path::{Path, PathBuf};

use tokio::task::JoinHandle;

use super::host::{HostHandle, SessionHost};
use super::session::Session;
use crate::models::SyncSettings;
use crate::persist::{
    JsonMetadataStore, JsonSettingsStore, SettingsRepository, METADATA_FILE_NAME,
    SETTINGS_FILE_NAME,
};
use crate::storage::{S3Config, S3ObjectStore, TokioFiles};
use crate::sync::SyncOrchestrator;
use crate::{Error, Result};

/// Session over local disk, JSON metadata and S3 (when configured).
pub type LocalSession = Session<TokioFiles, JsonMetadataStore, Option<S3ObjectStore>>;

/// A data directory holding `settings.json` and `files-data.json`.
#[derive(Debug, Clone)]
pub struct Workspace {
    data_dir: PathBuf,
    settings: JsonSettingsStore,
}

impl Workspace {
    /// Use `data_dir`, creating it when missing.
    pub fn open_path(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir).map_err(|error| Error::filesystem(&data_dir, error))?;
        let settings = JsonSettingsStore::new(data_dir.join(SETTINGS_FILE_NAME));
        Ok(Self { data_dir, settings })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join(METADATA_FILE_NAME)
    }

    /// Settings exactly as stored on disk.
    pub fn stored_settings(&self) -> Result<SyncSettings> {
        self.settings.load()
    }

    pub fn save_settings(&self, settings: &SyncSettings) -> Result<()> {
        self.settings.save(settings)
    }

    /// Stored settings with `CLOUDNOTE_*` environment overrides applied.
    pub fn effective_settings(&self) -> Result<SyncSettings> {
        self.stored_settings()?.overlay_env()
    }

    /// Build a session from the effective settings.
    pub fn open_session(&self) -> Result<LocalSession> {
        let settings = self.effective_settings()?;
        let remote = S3Config::from_settings(&settings).map(S3ObjectStore::new);
        if remote.is_some() {
            tracing::info!("Sync configured for bucket {:?}", settings.bucket_name);
        } else {
            tracing::info!("Running in local-only mode (sync not configured)");
        }
        Session::load(
            TokioFiles,
            JsonMetadataStore::new(self.metadata_path()),
            SyncOrchestrator::new(remote),
            settings,
        )
    }

    /// Open a session and spawn a host for it.
    pub fn spawn_host(&self) -> Result<(HostHandle, JoinHandle<()>)> {
        Ok(SessionHost::spawn(self.open_session()?))
    }
}
