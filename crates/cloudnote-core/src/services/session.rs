//! Editing session: the registry wired to disk, metadata and the remote store.
//!
//! Every operation that touches disk runs the disk step first and commits
//! into the registry only once it succeeded. Metadata is rewritten in full
//! after each change to persisted fields.

use std::collections::HashMap;
use std::path::PathBuf;

use tokio::sync::broadcast;

use crate::models::{DocumentId, DocumentMeta, DocumentRecord, SyncSettings};
use crate::persist::MetadataStore;
use crate::registry::DocumentRegistry;
use crate::storage::{LocalFiles, ObjectStore};
use crate::sync::{ensure_configured, BatchReport, DownloadStatus, SyncOrchestrator};
use crate::util::now_millis;
use crate::{Error, Result};

const EVENT_CAPACITY: usize = 64;

/// Notifications emitted when sync-related state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A single upload landed and the document is synced.
    Uploaded { id: DocumentId },
    /// A download attempt finished with the given status.
    Downloaded {
        id: DocumentId,
        status: DownloadStatus,
    },
    /// A bulk upload finished.
    BatchUploaded { uploaded: usize, failed: usize },
    /// A remote operation failed; `id` is `None` for batch failures.
    SyncFailed {
        id: Option<DocumentId>,
        message: String,
    },
}

/// Upload prepared by [`Session::prepare_upload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadJob {
    pub id: DocumentId,
    pub key: String,
    pub path: PathBuf,
    /// Record revision whose content the local file holds.
    pub revision: u64,
}

/// Bulk upload prepared by [`Session::prepare_upload_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    pub rows: Vec<DocumentMeta>,
    /// Revisions of the records whose file on disk matches their content.
    /// Records with unsaved edits are absent and never marked synced.
    pub revisions: HashMap<DocumentId, u64>,
}

/// Download prepared by [`Session::prepare_download`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub id: DocumentId,
    pub key: String,
    pub path: PathBuf,
    pub local_updated_at: Option<i64>,
}

/// How [`Session::open`] should populate a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenPlan {
    /// Body already in memory.
    Ready,
    /// Read the local file.
    ReadLocal,
    /// Go through the download path first.
    Download(DownloadJob),
}

/// One editing session
pub struct Session<F, M, R> {
    registry: DocumentRegistry,
    files: F,
    metadata: M,
    sync: SyncOrchestrator<R>,
    settings: SyncSettings,
    events: broadcast::Sender<SessionEvent>,
}

impl<F, M, R> Session<F, M, R>
where
    F: LocalFiles,
    M: MetadataStore,
    R: ObjectStore,
{
    /// Start a session from the persisted metadata.
    pub fn load(
        files: F,
        metadata: M,
        sync: SyncOrchestrator<R>,
        settings: SyncSettings,
    ) -> Result<Self> {
        let rows = metadata.load()?;
        tracing::info!("Loaded {} documents from metadata store", rows.len());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            registry: DocumentRegistry::from_meta(rows),
            files,
            metadata,
            sync,
            settings,
            events,
        })
    }

    pub const fn registry(&self) -> &DocumentRegistry {
        &self.registry
    }

    pub const fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: SyncSettings) {
        self.settings = settings;
    }

    pub const fn metadata(&self) -> &M {
        &self.metadata
    }

    pub const fn orchestrator(&self) -> &SyncOrchestrator<R> {
        &self.sync
    }

    pub fn document(&self, id: &DocumentId) -> Result<&DocumentRecord> {
        self.registry.require(id)
    }

    /// Subscribe to sync notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn event_sender(&self) -> broadcast::Sender<SessionEvent> {
        self.events.clone()
    }

    /// Allocate a new unsaved document.
    pub fn create(&mut self, title: &str) -> DocumentId {
        let id = self.registry.create(title);
        tracing::debug!("Created draft document {id}");
        id
    }

    /// Replace a document's body; `false` when nothing changed.
    pub fn edit(&mut self, id: &DocumentId, body: &str) -> Result<bool> {
        self.registry.edit(id, body)
    }

    /// Titles containing `keyword`, in registry order.
    pub fn search(&self, keyword: &str) -> Vec<&DocumentRecord> {
        self.registry.search(keyword)
    }

    pub fn close_tab(&mut self, id: &DocumentId) {
        self.registry.close_tab(id);
    }

    /// Open a document, loading its body when needed.
    ///
    /// With auto-sync on, an unloaded document goes through the download
    /// path; otherwise it is read from disk.
    pub async fn open(&mut self, id: &DocumentId) -> Result<Option<DownloadStatus>> {
        match self.plan_open(id)? {
            OpenPlan::Ready => Ok(None),
            OpenPlan::ReadLocal => {
                self.load_local(id).await?;
                Ok(None)
            }
            OpenPlan::Download(job) => {
                let result = self
                    .sync
                    .download_one(&self.settings, &job.key, &job.path, job.local_updated_at)
                    .await;
                self.apply_download(&job, result).await.map(Some)
            }
        }
    }

    /// Decide how to open `id` and mark it open/active.
    pub fn plan_open(&mut self, id: &DocumentId) -> Result<OpenPlan> {
        let record = self.registry.require(id)?;
        let plan = if record.is_loaded() {
            OpenPlan::Ready
        } else if self.settings.is_auto_sync() {
            OpenPlan::Download(self.prepare_download(id)?)
        } else {
            OpenPlan::ReadLocal
        };
        self.registry.open_tab(id);
        Ok(plan)
    }

    /// Populate an unloaded document from its local file.
    pub async fn load_local(&mut self, id: &DocumentId) -> Result<()> {
        let record = self.registry.require(id)?;
        if record.is_loaded() {
            return Ok(());
        }
        let path = durable_path(record)?;
        let body = self.files.read(&path).await?;
        self.registry.require_mut(id)?.finish_loading(body);
        Ok(())
    }

    /// Give a document a title, writing (drafts) or renaming (persisted)
    /// its file before committing.
    pub async fn rename(&mut self, id: &DocumentId, title: &str) -> Result<()> {
        let title = self.registry.validate_title(id, title)?;
        let record = self.registry.require(id)?;
        let new_path = self
            .registry
            .path_for_title(id, &title, &self.settings.default_save_dir())?;

        let was_draft = record.is_new();
        if was_draft {
            let body = record.body().unwrap_or_default().to_string();
            self.files.write(&new_path, &body).await?;
        } else {
            let old_path = durable_path(record)?;
            if old_path == new_path {
                return Ok(());
            }
            self.files.rename(&old_path, &new_path).await?;
        }

        self.registry
            .require_mut(id)?
            .commit_location(title.clone(), new_path);
        if was_draft {
            self.registry.mark_saved(id);
        }
        self.persist()?;
        tracing::info!("Renamed document {id} to '{title}'");
        Ok(())
    }

    /// Remove a document, deleting its file first when it has one.
    pub async fn delete(&mut self, id: &DocumentId) -> Result<()> {
        let record = self.registry.require(id)?;
        if record.is_new() {
            self.registry.remove(id);
            return Ok(());
        }

        let path = durable_path(record)?;
        self.files.delete(&path).await?;
        self.registry.remove(id);
        self.persist()?;
        tracing::info!("Deleted document {id}");
        Ok(())
    }

    /// Track existing Markdown files; paths already tracked are skipped.
    pub fn import(&mut self, paths: impl IntoIterator<Item = PathBuf>) -> Result<Vec<DocumentId>> {
        let mut imported = Vec::new();
        for path in paths {
            if self.registry.tracks_path(&path) {
                tracing::debug!("Skipping already imported {}", path.display());
                continue;
            }
            imported.push(self.registry.insert(DocumentRecord::imported(path)));
        }
        if !imported.is_empty() {
            self.persist()?;
            tracing::info!("Imported {} documents", imported.len());
        }
        Ok(imported)
    }

    /// Write a document's body to disk. With auto-sync on, the document is
    /// uploaded afterwards.
    pub async fn save(&mut self, id: &DocumentId) -> Result<()> {
        self.write_body(id).await?;
        if self.settings.is_auto_sync() {
            self.upload_one(id).await?;
        }
        Ok(())
    }

    /// Write the in-memory body to the document's path.
    pub async fn write_body(&mut self, id: &DocumentId) -> Result<()> {
        let record = self.registry.require(id)?;
        let path = durable_path(record)?;
        let body = record.body().ok_or_else(|| {
            Error::InvalidInput(format!("Document {id} is not loaded; nothing to save"))
        })?;
        self.files.write(&path, body).await?;
        self.registry.mark_saved(id);
        Ok(())
    }

    /// Upload one document and mark it synced.
    pub async fn upload_one(&mut self, id: &DocumentId) -> Result<()> {
        let job = self.prepare_upload(id).await?;
        let result = self
            .sync
            .upload_one(&self.settings, &job.key, &job.path)
            .await;
        self.apply_upload(&job, result)
    }

    /// Pull one document if the remote copy is newer.
    pub async fn download_one(&mut self, id: &DocumentId) -> Result<DownloadStatus> {
        let job = self.prepare_download(id)?;
        let result = self
            .sync
            .download_one(&self.settings, &job.key, &job.path, job.local_updated_at)
            .await;
        self.apply_download(&job, result).await
    }

    /// Upload every persisted document.
    pub async fn upload_all(&mut self) -> Result<BatchReport> {
        let batch = self.prepare_upload_all()?;
        let result = self.sync.upload_all(&self.settings, &batch.rows).await;
        self.apply_upload_all(&batch, result)
    }

    /// Check preconditions and make sure the local file is current.
    pub async fn prepare_upload(&mut self, id: &DocumentId) -> Result<UploadJob> {
        ensure_configured(&self.settings)?;
        let record = self.registry.require(id)?;
        let path = durable_path(record)?;
        let key = record.object_key();
        let revision = record.revision();
        if record.is_loaded() && self.registry.is_unsaved(id) {
            self.write_body(id).await?;
        }
        Ok(UploadJob {
            id: *id,
            key,
            path,
            revision,
        })
    }

    /// Mark the document synced unless it was edited or renamed while the
    /// upload ran.
    pub fn apply_upload(&mut self, job: &UploadJob, result: Result<()>) -> Result<()> {
        if let Err(error) = result {
            self.emit_failure(Some(job.id), &error);
            return Err(error);
        }
        let synced = self
            .registry
            .get_mut(&job.id)
            .is_some_and(|record| record.mark_synced(job.revision, now_millis()));
        if !synced {
            tracing::info!("Document {} changed during upload; left unsynced", job.id);
            return Ok(());
        }
        self.persist()?;
        self.emit(SessionEvent::Uploaded { id: job.id });
        Ok(())
    }

    /// Check preconditions and put the document in the loading state when
    /// its body is not in memory yet.
    pub fn prepare_download(&mut self, id: &DocumentId) -> Result<DownloadJob> {
        ensure_configured(&self.settings)?;
        let record = self.registry.require(id)?;
        let job = DownloadJob {
            id: *id,
            key: record.object_key(),
            path: durable_path(record)?,
            local_updated_at: record.updated_at(),
        };
        if !record.is_loaded() {
            self.registry.require_mut(id)?.begin_loading();
        }
        Ok(job)
    }

    /// Apply a finished download. The body is (re)read from the local file,
    /// which the download replaced when the remote copy won.
    pub async fn apply_download(
        &mut self,
        job: &DownloadJob,
        result: Result<DownloadStatus>,
    ) -> Result<DownloadStatus> {
        let status = match result {
            Ok(status) => status,
            Err(error) => {
                self.abort_loading(&job.id);
                self.emit_failure(Some(job.id), &error);
                return Err(error);
            }
        };

        let needs_body = self
            .registry
            .get(&job.id)
            .is_some_and(|record| !record.is_loaded());
        if status == DownloadStatus::DownloadSuccess || needs_body {
            let body = match self.files.read(&job.path).await {
                Ok(body) => body,
                Err(error) => {
                    self.abort_loading(&job.id);
                    return Err(error);
                }
            };
            let record = self.registry.require_mut(&job.id)?;
            if status == DownloadStatus::DownloadSuccess {
                record.finish_download(body, now_millis());
                self.registry.mark_saved(&job.id);
                self.persist()?;
            } else {
                record.finish_loading(body);
            }
        }

        self.emit(SessionEvent::Downloaded { id: job.id, status });
        Ok(status)
    }

    /// Persisted rows to upload in bulk.
    pub fn prepare_upload_all(&self) -> Result<BatchJob> {
        ensure_configured(&self.settings)?;
        let rows = self.metadata.load()?;
        let revisions = rows
            .iter()
            .filter(|row| !self.registry.is_unsaved(&row.id))
            .filter_map(|row| {
                let record = self.registry.get(&row.id)?;
                (record.title() == row.title && record.path() == Some(row.path.as_path()))
                    .then_some((row.id, record.revision()))
            })
            .collect();
        Ok(BatchJob { rows, revisions })
    }

    /// Mark uploaded documents synced with the batch timestamp, skipping
    /// any that changed since the batch was prepared.
    pub fn apply_upload_all(
        &mut self,
        batch: &BatchJob,
        result: Result<BatchReport>,
    ) -> Result<BatchReport> {
        let report = match result {
            Ok(report) => report,
            Err(error) => {
                self.emit_failure(None, &error);
                return Err(error);
            }
        };

        let mut marked = 0;
        for id in &report.uploaded {
            let Some(&revision) = batch.revisions.get(id) else {
                continue;
            };
            if let Some(record) = self.registry.get_mut(id) {
                if record.mark_synced(revision, report.synced_at) {
                    marked += 1;
                }
            }
        }
        if marked < report.uploaded.len() {
            tracing::info!(
                "{} uploaded documents changed during the batch; left unsynced",
                report.uploaded.len() - marked
            );
        }
        if marked > 0 {
            self.persist()?;
        }

        self.emit(SessionEvent::BatchUploaded {
            uploaded: report.uploaded.len(),
            failed: report.failed.len(),
        });
        if !report.is_complete() {
            self.emit(SessionEvent::SyncFailed {
                id: None,
                message: format!(
                    "{} of {} uploads failed",
                    report.failed.len(),
                    report.total()
                ),
            });
        }
        Ok(report)
    }

    /// Leave the loading state after a failed or cancelled load.
    pub fn abort_loading(&mut self, id: &DocumentId) {
        if let Some(record) = self.registry.get_mut(id) {
            record.abort_loading();
        }
    }

    /// Rewrite the metadata store from the registry.
    pub fn persist(&self) -> Result<()> {
        self.metadata.save_all(&self.registry.snapshot_meta())
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn emit_failure(&self, id: Option<DocumentId>, error: &Error) {
        if error.is_remote() {
            self.emit(SessionEvent::SyncFailed {
                id,
                message: error.to_string(),
            });
        }
    }
}

fn durable_path(record: &DocumentRecord) -> Result<PathBuf> {
    if record.is_new() {
        return Err(Error::InvalidInput(format!(
            "Document {} has not been saved yet; give it a title first",
            record.id()
        )));
    }
    record
        .path()
        .map(std::path::Path::to_path_buf)
        .ok_or_else(|| Error::InvalidInput(format!("Document {} has no path", record.id())))
}
