use std::path::Path;

use cloudnote_core::models::SyncSettings;
use cloudnote_core::services::Workspace;
use cloudnote_core::storage::{S3Config, S3ObjectStore};
use serde::Serialize;

use crate::cli::ConfigCommands;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct SettingsView {
    pub access_key: Option<String>,
    pub secret_key: Option<&'static str>,
    pub bucket_name: Option<String>,
    pub endpoint_url: Option<String>,
    pub region: Option<String>,
    pub enable_auto_sync: bool,
    pub saved_file_location: String,
    pub sync_configured: bool,
}

impl SettingsView {
    pub fn new(settings: &SyncSettings) -> Self {
        Self {
            access_key: settings.access_key.clone(),
            secret_key: settings.secret_key.as_ref().map(|_| "********"),
            bucket_name: settings.bucket_name.clone(),
            endpoint_url: settings.endpoint_url.clone(),
            region: settings.region.clone(),
            enable_auto_sync: settings.enable_auto_sync,
            saved_file_location: settings.default_save_dir().display().to_string(),
            sync_configured: settings.is_sync_configured(),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        let show = |value: Option<&str>| value.unwrap_or("(not set)").to_string();
        vec![
            format!("access_key:          {}", show(self.access_key.as_deref())),
            format!("secret_key:          {}", show(self.secret_key)),
            format!("bucket_name:         {}", show(self.bucket_name.as_deref())),
            format!("endpoint_url:        {}", show(self.endpoint_url.as_deref())),
            format!("region:              {}", show(self.region.as_deref())),
            format!("enable_auto_sync:    {}", self.enable_auto_sync),
            format!("saved_file_location: {}", self.saved_file_location),
            format!("sync_configured:     {}", self.sync_configured),
        ]
    }
}

pub async fn run_config(command: ConfigCommands, data_dir: &Path) -> Result<(), CliError> {
    let workspace = Workspace::open_path(data_dir)?;
    match command {
        ConfigCommands::Show { json } => run_config_show(&workspace, json),
        ConfigCommands::Check => run_config_check(&workspace).await,
        ConfigCommands::Set { key, value } => run_config_set(&workspace, &key, &value),
    }
}

pub fn run_config_show(workspace: &Workspace, as_json: bool) -> Result<(), CliError> {
    let view = SettingsView::new(&workspace.effective_settings()?);
    if as_json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        for line in view.lines() {
            println!("{line}");
        }
    }
    Ok(())
}

/// Probe the bucket with the effective credentials.
pub async fn run_config_check(workspace: &Workspace) -> Result<(), CliError> {
    let settings = workspace.effective_settings()?;
    let config =
        S3Config::from_settings(&settings).ok_or(cloudnote_core::Error::SyncNotConfigured)?;
    let bucket = config.bucket.clone();

    S3ObjectStore::new(config).bucket_is_reachable().await?;
    println!("Bucket {bucket} is reachable");
    Ok(())
}

/// Update one stored setting; environment overrides are never written back.
pub fn run_config_set(workspace: &Workspace, key: &str, value: &str) -> Result<(), CliError> {
    let mut settings = workspace.stored_settings()?;
    settings.set(key.trim(), value)?;
    workspace.save_settings(&settings)?;
    tracing::info!("Updated setting {key}");
    println!("{key} updated");
    Ok(())
}
