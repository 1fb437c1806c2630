//! S3-compatible object storage client.

use std::path::Path;

use aws_credential_types::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::{primitives::ByteStream, Client};
use aws_types::region::Region;

use super::remote::{ObjectStat, ObjectStore};
use crate::models::SyncSettings;
use crate::util::{compact_text, normalize_text_option};
use crate::{Error, Result};

const DEFAULT_REGION: &str = "us-east-1";
const MARKDOWN_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

/// S3 connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct S3Config {
    /// Bucket documents are mirrored into.
    pub bucket: String,
    /// Access key id for S3-compatible auth.
    pub access_key_id: String,
    /// Secret access key for S3-compatible auth.
    pub secret_access_key: String,
    /// Custom endpoint for S3-compatible providers; `None` targets AWS.
    pub endpoint_url: Option<String>,
    pub region: String,
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("S3Config")
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("endpoint_url", &self.endpoint_url)
            .field("region", &self.region)
            .finish()
    }
}

impl S3Config {
    /// Build a config from settings.
    ///
    /// Returns `None` when the credential gate is not satisfied.
    pub fn from_settings(settings: &SyncSettings) -> Option<Self> {
        if !settings.is_sync_configured() {
            return None;
        }
        Some(Self {
            bucket: normalize_text_option(settings.bucket_name.clone())?,
            access_key_id: normalize_text_option(settings.access_key.clone())?,
            secret_access_key: normalize_text_option(settings.secret_key.clone())?,
            endpoint_url: normalize_text_option(settings.endpoint_url.clone()),
            region: normalize_text_option(settings.region.clone())
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
        })
    }
}

/// S3-backed [`ObjectStore`].
#[derive(Clone, Debug)]
pub struct S3ObjectStore {
    config: S3Config,
    client: Client,
}

impl S3ObjectStore {
    #[must_use]
    pub fn new(config: S3Config) -> Self {
        let client = build_s3_client(&config);
        Self { config, client }
    }

    #[must_use]
    pub const fn config(&self) -> &S3Config {
        &self.config
    }

    /// Check that the configured bucket is reachable with current credentials.
    pub async fn bucket_is_reachable(&self) -> Result<()> {
        self.client
            .head_bucket()
            .bucket(&self.config.bucket)
            .send()
            .await
            .map_err(|error| {
                storage_error(
                    "head_bucket",
                    &self.config.bucket,
                    None,
                    DisplayErrorContext(error),
                )
            })?;
        Ok(())
    }
}

impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, local_path: &Path) -> Result<()> {
        let object_key = normalize_object_key(key)?;
        let bytes = tokio::fs::read(local_path)
            .await
            .map_err(|error| Error::filesystem(local_path, error))?;

        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .content_type(MARKDOWN_CONTENT_TYPE)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|error| {
                storage_error(
                    "put_object",
                    &self.config.bucket,
                    Some(&object_key),
                    DisplayErrorContext(error),
                )
            })?;

        Ok(())
    }

    async fn get(&self, key: &str, local_path: &Path) -> Result<()> {
        let object_key = normalize_object_key(key)?;

        let response = match self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => {
                if error
                    .as_service_error()
                    .is_some_and(GetObjectError::is_no_such_key)
                {
                    return Err(Error::RemoteNotFound(object_key));
                }
                return Err(storage_error(
                    "get_object",
                    &self.config.bucket,
                    Some(&object_key),
                    DisplayErrorContext(error),
                ));
            }
        };

        let payload = response.body.collect().await.map_err(|error| {
            storage_error(
                "get_object_body",
                &self.config.bucket,
                Some(&object_key),
                error,
            )
        })?;

        tokio::fs::write(local_path, payload.into_bytes())
            .await
            .map_err(|error| Error::filesystem(local_path, error))
    }

    async fn stat(&self, key: &str) -> Result<ObjectStat> {
        let object_key = normalize_object_key(key)?;

        let response = match self
            .client
            .head_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => {
                if error
                    .as_service_error()
                    .is_some_and(HeadObjectError::is_not_found)
                {
                    return Err(Error::RemoteNotFound(object_key));
                }
                return Err(storage_error(
                    "head_object",
                    &self.config.bucket,
                    Some(&object_key),
                    DisplayErrorContext(error),
                ));
            }
        };

        let last_modified = response.last_modified().ok_or_else(|| {
            storage_error(
                "head_object",
                &self.config.bucket,
                Some(&object_key),
                "response is missing Last-Modified",
            )
        })?;

        let millis = last_modified
            .secs()
            .saturating_mul(1_000)
            .saturating_add(i64::from(last_modified.subsec_nanos() / 1_000_000));
        Ok(ObjectStat::from_millis(millis))
    }
}

fn build_s3_client(config: &S3Config) -> Client {
    let credentials = Credentials::new(
        config.access_key_id.clone(),
        config.secret_access_key.clone(),
        None,
        None,
        "cloudnote-core-s3-storage",
    );

    let mut builder = aws_sdk_s3::config::Builder::new()
        .region(Region::new(config.region.clone()))
        .credentials_provider(credentials);

    if let Some(endpoint_url) = &config.endpoint_url {
        builder = builder
            .endpoint_url(endpoint_url.clone())
            .force_path_style(true);
    }

    Client::from_conf(builder.build())
}

fn storage_error(
    operation: &str,
    bucket: &str,
    object_key: Option<&str>,
    error: impl std::fmt::Display,
) -> Error {
    let target = object_key.map_or_else(|| bucket.to_string(), |key| format!("{bucket}/{key}"));
    Error::RemoteTransfer(format!(
        "S3 {operation} failed for {target}: {}",
        compact_text(&error.to_string())
    ))
}

fn normalize_object_key(object_key: &str) -> Result<String> {
    let object_key = object_key.trim().trim_matches('/').to_string();
    if object_key.is_empty() {
        return Err(Error::InvalidInput(
            "Object key cannot be empty".to_string(),
        ));
    }
    Ok(object_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SyncSettings {
        SyncSettings {
            access_key: Some("AKID123".to_string()),
            secret_key: Some("SECRET123".to_string()),
            bucket_name: Some("bucket-a".to_string()),
            ..SyncSettings::default()
        }
    }

    #[test]
    fn from_settings_requires_credential_gate() {
        assert!(S3Config::from_settings(&SyncSettings::default()).is_none());
    }

    #[test]
    fn from_settings_defaults_region() {
        let config = S3Config::from_settings(&settings()).unwrap();
        assert_eq!(config.region, DEFAULT_REGION);
        assert_eq!(config.bucket, "bucket-a");
        assert!(config.endpoint_url.is_none());
    }

    #[test]
    fn from_settings_keeps_custom_endpoint() {
        let settings = SyncSettings {
            endpoint_url: Some("http://localhost:9000".to_string()),
            region: Some("auto".to_string()),
            ..settings()
        };
        let config = S3Config::from_settings(&settings).unwrap();
        assert_eq!(config.endpoint_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.region, "auto");
    }

    #[test]
    fn config_debug_redacts_secret() {
        let config = S3Config::from_settings(&settings()).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("SECRET123"));
    }

    #[test]
    fn normalize_object_key_rejects_empty() {
        let err = normalize_object_key("   ").unwrap_err();
        match err {
            Error::InvalidInput(message) => assert!(message.contains("Object key")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn normalize_object_key_trims_slashes() {
        assert_eq!(normalize_object_key("/plan.md/").unwrap(), "plan.md");
    }

    #[test]
    fn storage_error_is_remote_transfer() {
        let err = storage_error("put_object", "bucket", Some("a.md"), "denied");
        assert!(err.is_remote());
        assert!(err.to_string().contains("bucket/a.md"));
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "Requires CLOUDNOTE_* env vars plus network access"]
    async fn s3_object_roundtrip_put_stat_get() {
        let _ = dotenvy::dotenv();

        let settings = SyncSettings::default()
            .overlay_env()
            .expect("env parsing should not error");
        let config = S3Config::from_settings(&settings).expect("S3 config should be present");
        let store = S3ObjectStore::new(config);
        store.bucket_is_reachable().await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let upload = dir.path().join("roundtrip.md");
        std::fs::write(&upload, "# roundtrip").unwrap();
        store.put("cloudnote-roundtrip.md", &upload).await.unwrap();

        let stat = store.stat("cloudnote-roundtrip.md").await.unwrap();
        assert!(stat.last_modified_millis() > 0);

        let download = dir.path().join("downloaded.md");
        store.get("cloudnote-roundtrip.md", &download).await.unwrap();
        assert_eq!(std::fs::read_to_string(download).unwrap(), "# roundtrip");
    }
}
