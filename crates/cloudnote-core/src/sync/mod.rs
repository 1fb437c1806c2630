//! Sync orchestrator: pushes and pulls documents against the object store.
//!
//! Conflict policy is last-writer-wins by server clock. A download only
//! happens when the remote object is strictly newer than the local
//! `updated_at` (or the document has never been synced); content is never
//! merged.

use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::models::{DocumentId, DocumentMeta, SyncSettings};
use crate::storage::ObjectStore;
use crate::util::now_millis;
use crate::{Error, Result};

/// Outcome of a single download attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DownloadStatus {
    /// Remote copy was newer and replaced the local file.
    DownloadSuccess,
    /// Local copy is as new as the remote one; nothing transferred.
    NoNewFile,
    /// No remote object under the document's key.
    NoFile,
}

impl DownloadStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DownloadSuccess => "download-success",
            Self::NoNewFile => "no-new-file",
            Self::NoFile => "no-file",
        }
    }
}

/// Whether a remote object stamped `server_time` should replace a local copy
/// last synced at `local_time`.
pub const fn remote_wins(server_time: i64, local_time: Option<i64>) -> bool {
    match local_time {
        Some(local_time) => server_time > local_time,
        None => true,
    }
}

/// Per-item result of a bulk upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Documents whose upload landed.
    pub uploaded: Vec<DocumentId>,
    /// Documents whose upload failed, with the failure message.
    pub failed: Vec<(DocumentId, String)>,
    /// Timestamp applied to every uploaded document.
    pub synced_at: i64,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.uploaded.len() + self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// All-or-nothing view: an error when any item failed.
    pub fn into_result(self) -> Result<Self> {
        if self.is_complete() {
            return Ok(self);
        }
        let failed = self
            .failed
            .iter()
            .map(|(id, message)| format!("{id}: {message}"))
            .collect::<Vec<_>>()
            .join("; ");
        Err(Error::RemoteTransfer(format!(
            "{} of {} uploads failed ({failed})",
            self.failed.len(),
            self.total()
        )))
    }
}

/// Runs transfers against an [`ObjectStore`] behind the credential gate.
pub struct SyncOrchestrator<R> {
    remote: Arc<R>,
}

impl<R> Clone for SyncOrchestrator<R> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
        }
    }
}

impl<R: ObjectStore> SyncOrchestrator<R> {
    pub fn new(remote: R) -> Self {
        Self::from_shared(Arc::new(remote))
    }

    pub const fn from_shared(remote: Arc<R>) -> Self {
        Self { remote }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Upload the file at `path` under `key`.
    pub async fn upload_one(
        &self,
        settings: &SyncSettings,
        key: &str,
        path: &Path,
    ) -> Result<()> {
        ensure_configured(settings)?;
        match self.remote.put(key, path).await {
            Ok(()) => {
                tracing::info!("Uploaded {key}");
                Ok(())
            }
            Err(error) => {
                tracing::warn!("Upload of {key} failed: {error}");
                Err(as_transfer_error(error))
            }
        }
    }

    /// Pull `key` into `path` when the remote copy is newer than
    /// `local_updated_at`.
    pub async fn download_one(
        &self,
        settings: &SyncSettings,
        key: &str,
        path: &Path,
        local_updated_at: Option<i64>,
    ) -> Result<DownloadStatus> {
        ensure_configured(settings)?;

        let stat = match self.remote.stat(key).await {
            Ok(stat) => stat,
            Err(Error::RemoteNotFound(_)) => {
                tracing::debug!("No remote object for {key}");
                return Ok(DownloadStatus::NoFile);
            }
            Err(error) => {
                tracing::warn!("Stat of {key} failed: {error}");
                return Err(as_transfer_error(error));
            }
        };

        let server_time = stat.last_modified_millis();
        if !remote_wins(server_time, local_updated_at) {
            tracing::debug!(
                "Remote {key} at {server_time} is not newer than local {local_updated_at:?}"
            );
            return Ok(DownloadStatus::NoNewFile);
        }

        match self.remote.get(key, path).await {
            Ok(()) => {
                tracing::info!("Downloaded {key} (remote {server_time})");
                Ok(DownloadStatus::DownloadSuccess)
            }
            Err(Error::RemoteNotFound(_)) => Ok(DownloadStatus::NoFile),
            Err(error) => {
                tracing::warn!("Download of {key} failed: {error}");
                Err(as_transfer_error(error))
            }
        }
    }

    /// Upload every persisted row at once, reporting per item.
    ///
    /// Uses the persisted title and path, so documents not loaded in the
    /// session are included. An empty set never contacts the remote store.
    pub async fn upload_all(
        &self,
        settings: &SyncSettings,
        rows: &[DocumentMeta],
    ) -> Result<BatchReport> {
        ensure_configured(settings)?;

        let mut report = BatchReport {
            synced_at: now_millis(),
            ..BatchReport::default()
        };
        if rows.is_empty() {
            return Ok(report);
        }

        let transfers = rows.iter().map(|row| async move {
            let key = row.object_key();
            (row.id, key.clone(), self.remote.put(&key, &row.path).await)
        });

        for (id, key, result) in join_all(transfers).await {
            match result {
                Ok(()) => report.uploaded.push(id),
                Err(error) => {
                    tracing::warn!("Bulk upload of {key} failed: {error}");
                    report.failed.push((id, error.to_string()));
                }
            }
        }

        report.synced_at = now_millis();
        tracing::info!(
            "Bulk upload finished: {} uploaded, {} failed",
            report.uploaded.len(),
            report.failed.len()
        );
        Ok(report)
    }
}

/// Fail fast before any network call when credentials are incomplete.
pub fn ensure_configured(settings: &SyncSettings) -> Result<()> {
    if settings.is_sync_configured() {
        Ok(())
    } else {
        Err(Error::SyncNotConfigured)
    }
}

fn as_transfer_error(error: Error) -> Error {
    match error {
        Error::RemoteTransfer(_) | Error::Filesystem { .. } => error,
        other => Error::RemoteTransfer(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryObjectStore, TickUnit};
    use pretty_assertions::assert_eq;

    const T: i64 = 1_700_000_000_000;

    fn settings() -> SyncSettings {
        SyncSettings {
            access_key: Some("AKID".to_string()),
            secret_key: Some("SECRET".to_string()),
            bucket_name: Some("notes".to_string()),
            ..SyncSettings::default()
        }
    }

    fn row(dir: &Path, title: &str) -> DocumentMeta {
        let path = dir.join(format!("{title}.md"));
        std::fs::write(&path, format!("# {title}")).unwrap();
        DocumentMeta {
            id: DocumentId::new(),
            path,
            title: title.to_string(),
            created_at: 1,
            updated_at: None,
            is_synced: false,
        }
    }

    fn setup() -> (tempfile::TempDir, SyncOrchestrator<MemoryObjectStore>) {
        (
            tempfile::tempdir().unwrap(),
            SyncOrchestrator::new(MemoryObjectStore::new()),
        )
    }

    #[test]
    fn remote_wins_policy() {
        assert!(remote_wins(T + 1, Some(T)));
        assert!(!remote_wins(T, Some(T)));
        assert!(!remote_wins(T - 1, Some(T)));
        assert!(remote_wins(0, None));
    }

    #[tokio::test]
    async fn download_newer_remote_reports_success() {
        let (dir, sync) = setup();
        let path = dir.path().join("a.md");
        std::fs::write(&path, "local").unwrap();
        sync.remote().insert("a.md", "remote", T + 1);

        let status = sync
            .download_one(&settings(), "a.md", &path, Some(T))
            .await
            .unwrap();
        assert_eq!(status, DownloadStatus::DownloadSuccess);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "remote");
    }

    #[tokio::test]
    async fn download_older_remote_reports_no_new_file() {
        let (dir, sync) = setup();
        let path = dir.path().join("a.md");
        std::fs::write(&path, "local").unwrap();
        sync.remote().insert("a.md", "remote", T - 1);

        let status = sync
            .download_one(&settings(), "a.md", &path, Some(T))
            .await
            .unwrap();
        assert_eq!(status, DownloadStatus::NoNewFile);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "local");
        // stat only
        assert_eq!(sync.remote().call_count(), 1);
    }

    #[tokio::test]
    async fn download_missing_remote_reports_no_file() {
        let (dir, sync) = setup();
        let path = dir.path().join("a.md");

        let status = sync
            .download_one(&settings(), "a.md", &path, Some(T))
            .await
            .unwrap();
        assert_eq!(status, DownloadStatus::NoFile);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn download_without_local_timestamp_always_wins() {
        let (dir, sync) = setup();
        let path = dir.path().join("a.md");
        sync.remote().insert("a.md", "remote", 1);

        let status = sync
            .download_one(&settings(), "a.md", &path, None)
            .await
            .unwrap();
        assert_eq!(status, DownloadStatus::DownloadSuccess);
    }

    #[tokio::test]
    async fn download_converts_provider_ticks() {
        let dir = tempfile::tempdir().unwrap();
        let sync =
            SyncOrchestrator::new(MemoryObjectStore::with_unit(TickUnit::HundredNanoseconds));
        let path = dir.path().join("a.md");
        sync.remote().insert("a.md", "remote", T + 1);

        let status = sync
            .download_one(&settings(), "a.md", &path, Some(T))
            .await
            .unwrap();
        assert_eq!(status, DownloadStatus::DownloadSuccess);
    }

    #[tokio::test]
    async fn three_documents_two_stale_one_current() {
        let (dir, sync) = setup();
        let mut statuses = Vec::new();
        for (title, remote_time) in [("a", T + 10), ("b", T + 20), ("c", T)] {
            let path = dir.path().join(format!("{title}.md"));
            std::fs::write(&path, "local").unwrap();
            sync.remote().insert(&format!("{title}.md"), "remote", remote_time);
            statuses.push(
                sync.download_one(&settings(), &format!("{title}.md"), &path, Some(T))
                    .await
                    .unwrap(),
            );
        }

        let successes = statuses
            .iter()
            .filter(|status| **status == DownloadStatus::DownloadSuccess)
            .count();
        let unchanged = statuses
            .iter()
            .filter(|status| **status == DownloadStatus::NoNewFile)
            .count();
        assert_eq!((successes, unchanged), (2, 1));
    }

    #[tokio::test]
    async fn unconfigured_upload_fails_fast() {
        let (dir, sync) = setup();
        let path = dir.path().join("a.md");
        std::fs::write(&path, "x").unwrap();

        let err = sync
            .upload_one(&SyncSettings::default(), "a.md", &path)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SyncNotConfigured));
        assert_eq!(sync.remote().call_count(), 0);
    }

    #[tokio::test]
    async fn upload_failure_is_transfer_error() {
        let (dir, sync) = setup();
        let path = dir.path().join("a.md");
        std::fs::write(&path, "x").unwrap();
        sync.remote().fail_on("a.md");

        let err = sync.upload_one(&settings(), "a.md", &path).await.unwrap_err();
        assert!(matches!(err, Error::RemoteTransfer(_)));
    }

    #[tokio::test]
    async fn upload_all_empty_never_contacts_remote() {
        let (_dir, sync) = setup();
        let report = sync.upload_all(&settings(), &[]).await.unwrap();
        assert_eq!(report.total(), 0);
        assert!(report.is_complete());
        assert_eq!(sync.remote().call_count(), 0);
    }

    #[tokio::test]
    async fn upload_all_reports_per_item() {
        let (dir, sync) = setup();
        let rows = vec![
            row(dir.path(), "a"),
            row(dir.path(), "b"),
            row(dir.path(), "c"),
        ];
        sync.remote().fail_on("b.md");

        let report = sync.upload_all(&settings(), &rows).await.unwrap();
        assert_eq!(report.uploaded, vec![rows[0].id, rows[2].id]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, rows[1].id);
        // Items that landed stay uploaded.
        assert_eq!(sync.remote().object("a.md").unwrap(), b"# a".to_vec());

        let err = report.into_result().unwrap_err();
        assert!(err.to_string().contains("1 of 3 uploads failed"));
    }

    #[tokio::test]
    async fn upload_all_missing_local_file_is_reported_failure() {
        let (dir, sync) = setup();
        let mut gone = row(dir.path(), "gone");
        gone.path = dir.path().join("never-written.md");

        let report = sync.upload_all(&settings(), &[gone]).await.unwrap();
        assert!(!report.is_complete());
    }

    #[test]
    fn download_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&DownloadStatus::DownloadSuccess).unwrap(),
            "\"download-success\""
        );
        assert_eq!(DownloadStatus::NoNewFile.as_str(), "no-new-file");
        assert_eq!(DownloadStatus::NoFile.as_str(), "no-file");
    }
}
