//! Sync and storage settings model

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

const ENV_ACCESS_KEY: &str = "CLOUDNOTE_ACCESS_KEY";
const ENV_SECRET_KEY: &str = "CLOUDNOTE_SECRET_KEY";
const ENV_BUCKET: &str = "CLOUDNOTE_BUCKET";
const ENV_ENDPOINT_URL: &str = "CLOUDNOTE_ENDPOINT_URL";
const ENV_REGION: &str = "CLOUDNOTE_REGION";

/// Settings names accepted by [`SyncSettings::set`].
pub const SETTING_NAMES: &[&str] = &[
    "access_key",
    "secret_key",
    "bucket_name",
    "endpoint_url",
    "region",
    "enable_auto_sync",
    "saved_file_location",
];

/// Credentials and storage preferences.
///
/// This is the credential gate: network operations are short-circuited
/// unless [`SyncSettings::is_sync_configured`] holds.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub bucket_name: Option<String>,
    /// S3-compatible endpoint; `None` means AWS itself.
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    /// Whether open/save implicitly download/upload.
    #[serde(default)]
    pub enable_auto_sync: bool,
    /// Directory new documents are saved into.
    #[serde(default)]
    pub saved_file_location: Option<PathBuf>,
}

impl std::fmt::Debug for SyncSettings {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncSettings")
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "[REDACTED]"))
            .field("bucket_name", &self.bucket_name)
            .field("endpoint_url", &self.endpoint_url)
            .field("region", &self.region)
            .field("enable_auto_sync", &self.enable_auto_sync)
            .field("saved_file_location", &self.saved_file_location)
            .finish()
    }
}

impl SyncSettings {
    /// True iff access key, secret key and bucket name are all present.
    pub fn is_sync_configured(&self) -> bool {
        [&self.access_key, &self.secret_key, &self.bucket_name]
            .into_iter()
            .all(|value| normalize_text_option(value.clone()).is_some())
    }

    /// Whether open/save should talk to the remote store on their own.
    pub fn is_auto_sync(&self) -> bool {
        self.enable_auto_sync && self.is_sync_configured()
    }

    /// Directory for newly named documents, falling back to the user's
    /// documents directory.
    pub fn default_save_dir(&self) -> PathBuf {
        self.saved_file_location
            .clone()
            .filter(|path| !path.as_os_str().is_empty())
            .or_else(dirs::document_dir)
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Update a single setting by name.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        let text = normalize_text_option(Some(value.to_string()));
        match name {
            "access_key" => self.access_key = text,
            "secret_key" => self.secret_key = text,
            "bucket_name" => self.bucket_name = text,
            "endpoint_url" => {
                if let Some(url) = text.as_deref() {
                    validate_endpoint(url, name)?;
                }
                self.endpoint_url = text.map(|url| url.trim_end_matches('/').to_string());
            }
            "region" => self.region = text,
            "enable_auto_sync" => self.enable_auto_sync = parse_flag(value),
            "saved_file_location" => self.saved_file_location = text.map(PathBuf::from),
            other => {
                return Err(Error::InvalidInput(format!(
                    "Unknown setting '{other}'. Expected one of: {}",
                    SETTING_NAMES.join(", ")
                )))
            }
        }
        Ok(())
    }

    /// Overlay credentials from `CLOUDNOTE_*` environment variables.
    pub fn overlay_env(self) -> Result<Self> {
        self.overlay_from(|key| std::env::var(key).ok())
    }

    /// Overlay credentials from a lookup function.
    ///
    /// Leaves the settings untouched when no variable is set and rejects a
    /// partial set of credentials.
    pub fn overlay_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |key: &str| normalize_text_option(lookup(key));
        let access_key = read(ENV_ACCESS_KEY);
        let secret_key = read(ENV_SECRET_KEY);
        let bucket = read(ENV_BUCKET);
        let endpoint_url = read(ENV_ENDPOINT_URL);
        let region = read(ENV_REGION);

        let any_credential = access_key.is_some() || secret_key.is_some() || bucket.is_some();
        if any_credential {
            let mut missing = Vec::new();
            if access_key.is_none() {
                missing.push(ENV_ACCESS_KEY);
            }
            if secret_key.is_none() {
                missing.push(ENV_SECRET_KEY);
            }
            if bucket.is_none() {
                missing.push(ENV_BUCKET);
            }
            if !missing.is_empty() {
                return Err(Error::InvalidInput(format!(
                    "Sync environment is incomplete. Missing: {}",
                    missing.join(", ")
                )));
            }
            self.access_key = access_key;
            self.secret_key = secret_key;
            self.bucket_name = bucket;
        }

        if let Some(url) = endpoint_url {
            validate_endpoint(&url, ENV_ENDPOINT_URL)?;
            self.endpoint_url = Some(url.trim_end_matches('/').to_string());
        }
        if region.is_some() {
            self.region = region;
        }
        Ok(self)
    }
}

fn validate_endpoint(url: &str, field: &str) -> Result<()> {
    if is_http_url(url) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "{field} must start with http:// or https://"
        )))
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn configured() -> SyncSettings {
        SyncSettings {
            access_key: Some("AKID".to_string()),
            secret_key: Some("SECRET".to_string()),
            bucket_name: Some("notes".to_string()),
            ..SyncSettings::default()
        }
    }

    fn overlay(map: &HashMap<&str, &str>) -> Result<SyncSettings> {
        SyncSettings::default().overlay_from(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn test_default_is_unconfigured() {
        let settings = SyncSettings::default();
        assert!(!settings.is_sync_configured());
        assert!(!settings.is_auto_sync());
    }

    #[test]
    fn test_configured_requires_all_three() {
        assert!(configured().is_sync_configured());

        let mut blank_bucket = configured();
        blank_bucket.bucket_name = Some("   ".to_string());
        assert!(!blank_bucket.is_sync_configured());
    }

    #[test]
    fn test_auto_sync_needs_credentials() {
        let mut settings = SyncSettings {
            enable_auto_sync: true,
            ..SyncSettings::default()
        };
        assert!(!settings.is_auto_sync());
        settings = SyncSettings {
            enable_auto_sync: true,
            ..configured()
        };
        assert!(settings.is_auto_sync());
    }

    #[test]
    fn test_set_by_name() {
        let mut settings = SyncSettings::default();
        settings.set("bucket_name", " docs ").unwrap();
        settings.set("enable_auto_sync", "yes").unwrap();
        settings
            .set("endpoint_url", "https://s3.example.com/")
            .unwrap();
        assert_eq!(settings.bucket_name.as_deref(), Some("docs"));
        assert!(settings.enable_auto_sync);
        assert_eq!(
            settings.endpoint_url.as_deref(),
            Some("https://s3.example.com")
        );
        assert!(settings.set("colour", "blue").is_err());
        assert!(settings.set("endpoint_url", "s3.example.com").is_err());
    }

    #[test]
    fn test_overlay_without_env_is_noop() {
        let settings = overlay(&HashMap::new()).unwrap();
        assert_eq!(settings, SyncSettings::default());
    }

    #[test]
    fn test_overlay_rejects_partial_credentials() {
        let mut map = HashMap::new();
        map.insert(ENV_ACCESS_KEY, "AKID");
        let err = overlay(&map).unwrap_err();
        match err {
            Error::InvalidInput(message) => {
                assert!(message.contains(ENV_SECRET_KEY));
                assert!(message.contains(ENV_BUCKET));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_overlay_applies_complete_credentials() {
        let mut map = HashMap::new();
        map.insert(ENV_ACCESS_KEY, "AKID");
        map.insert(ENV_SECRET_KEY, "SECRET");
        map.insert(ENV_BUCKET, "notes");
        map.insert(ENV_ENDPOINT_URL, "http://localhost:9000/");
        let settings = overlay(&map).unwrap();
        assert!(settings.is_sync_configured());
        assert_eq!(
            settings.endpoint_url.as_deref(),
            Some("http://localhost:9000")
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", configured());
        assert!(!debug.contains("SECRET"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_default_save_dir_prefers_configured_location() {
        let settings = SyncSettings {
            saved_file_location: Some(PathBuf::from("/srv/notes")),
            ..SyncSettings::default()
        };
        assert_eq!(settings.default_save_dir(), PathBuf::from("/srv/notes"));
    }
}
