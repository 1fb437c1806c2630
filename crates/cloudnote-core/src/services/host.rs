//! Session host: a single task owning the [`Session`], driven by messages.
//!
//! Callers talk to it through a cloneable [`HostHandle`]. Local operations
//! run on the host task in arrival order. Remote transfers are spawned off
//! the loop so the host keeps serving requests while they run; their
//! results come back as completions and are applied on the host task.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::session::{BatchJob, DownloadJob, OpenPlan, Session, SessionEvent, UploadJob};
use crate::models::{DocumentId, DocumentRecord, Lifecycle};
use crate::persist::MetadataStore;
use crate::state::SyncState;
use crate::storage::{LocalFiles, ObjectStore};
use crate::sync::{BatchReport, DownloadStatus};
use crate::{Error, Result};

const REQUEST_CAPACITY: usize = 32;

/// Correlation id assigned to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Operations the host accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    List,
    Create { title: String },
    Open(DocumentId),
    Edit { id: DocumentId, body: String },
    Save(DocumentId),
    Rename { id: DocumentId, title: String },
    Delete(DocumentId),
    Import(Vec<PathBuf>),
    Search(String),
    CloseTab(DocumentId),
    UploadOne(DocumentId),
    DownloadOne(DocumentId),
    UploadAll,
}

/// Successful replies, one variant per [`Request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Documents(Vec<DocumentSummary>),
    Created(DocumentId),
    Opened {
        id: DocumentId,
        body: String,
        download: Option<DownloadStatus>,
    },
    Edited { id: DocumentId, changed: bool },
    Saved(DocumentId),
    Renamed(DocumentId),
    Deleted(DocumentId),
    Imported(Vec<DocumentId>),
    SearchResults(Vec<DocumentSummary>),
    TabClosed(DocumentId),
    Uploaded(DocumentId),
    Downloaded {
        id: DocumentId,
        status: DownloadStatus,
    },
    BatchUploaded(BatchReport),
}

/// Listing view of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub title: String,
    pub path: Option<PathBuf>,
    pub lifecycle: Lifecycle,
    pub created_at: i64,
    pub updated_at: Option<i64>,
    pub unsaved: bool,
}

impl DocumentSummary {
    fn new(record: &DocumentRecord, unsaved: bool) -> Self {
        Self {
            id: record.id(),
            title: record.title().to_string(),
            path: record.path().map(std::path::Path::to_path_buf),
            lifecycle: record.lifecycle(),
            created_at: record.created_at(),
            updated_at: record.updated_at(),
            unsaved,
        }
    }
}

/// Kinds of remote transfer tracked for duplicate detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TransferKind {
    Upload,
    Download,
    UploadAll,
}

type TransferKey = (TransferKind, Option<DocumentId>);
type Reply = oneshot::Sender<Result<Response>>;

struct Envelope {
    id: RequestId,
    request: Request,
    token: CancellationToken,
    reply: Reply,
}

/// What to do with a finished transfer.
enum Outcome {
    Upload {
        job: UploadJob,
        then: AfterUpload,
        result: Result<()>,
    },
    Download {
        job: DownloadJob,
        then: AfterDownload,
        result: Result<DownloadStatus>,
    },
    UploadAll {
        batch: BatchJob,
        result: Result<BatchReport>,
    },
}

#[derive(Debug, Clone, Copy)]
enum AfterUpload {
    Uploaded,
    Saved,
}

#[derive(Debug, Clone, Copy)]
enum AfterDownload {
    Downloaded,
    Opened,
}

struct Completion {
    request: RequestId,
    key: TransferKey,
    reply: Reply,
    /// `None` when the transfer was cancelled.
    outcome: Option<Outcome>,
}

/// Cloneable client side of a running host.
#[derive(Clone)]
pub struct HostHandle {
    requests: mpsc::Sender<Envelope>,
    next_id: Arc<AtomicU64>,
    state: watch::Receiver<SyncState>,
    events: broadcast::Sender<SessionEvent>,
}

/// A request that has been accepted by the host channel.
pub struct PendingRequest {
    id: RequestId,
    reply: oneshot::Receiver<Result<Response>>,
}

impl PendingRequest {
    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// Wait for the host's reply.
    pub async fn response(self) -> Result<Response> {
        self.reply
            .await
            .map_err(|_| Error::Channel(format!("host dropped {}", self.id)))?
    }
}

impl HostHandle {
    /// Send a request and wait for its reply.
    pub async fn request(&self, request: Request) -> Result<Response> {
        self.submit(request, CancellationToken::new())
            .await?
            .response()
            .await
    }

    /// Send a request that can be cancelled through `token`.
    pub async fn submit(
        &self,
        request: Request,
        token: CancellationToken,
    ) -> Result<PendingRequest> {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(Envelope {
                id,
                request,
                token,
                reply,
            })
            .await
            .map_err(|_| Error::Channel("session host is not running".to_string()))?;
        Ok(PendingRequest { id, reply: rx })
    }

    /// Current sync indicator.
    pub fn sync_state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Watch the sync indicator.
    pub fn watch_sync_state(&self) -> watch::Receiver<SyncState> {
        self.state.clone()
    }

    /// Subscribe to session notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

/// Task owning a [`Session`].
pub struct SessionHost<F, M, R> {
    session: Session<F, M, R>,
    requests: mpsc::Receiver<Envelope>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    in_flight: HashSet<TransferKey>,
    state: watch::Sender<SyncState>,
    shutdown: CancellationToken,
}

impl<F, M, R> SessionHost<F, M, R>
where
    F: LocalFiles,
    M: MetadataStore,
    R: ObjectStore,
{
    /// Spawn the host task. It stops once every handle is dropped and the
    /// outstanding transfers were cancelled.
    pub fn spawn(session: Session<F, M, R>) -> (HostHandle, JoinHandle<()>) {
        let (requests_tx, requests) = mpsc::channel(REQUEST_CAPACITY);
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let (state, state_rx) = watch::channel(idle_state(&session));
        let handle = HostHandle {
            requests: requests_tx,
            next_id: Arc::new(AtomicU64::new(1)),
            state: state_rx,
            events: session.event_sender(),
        };

        let host = Self {
            session,
            requests,
            completions_tx,
            completions,
            in_flight: HashSet::new(),
            state,
            shutdown: CancellationToken::new(),
        };
        (handle, tokio::spawn(host.run()))
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                Some(completion) = self.completions.recv() => self.finish(completion).await,
                envelope = self.requests.recv() => match envelope {
                    Some(envelope) => self.dispatch(envelope).await,
                    None => break,
                },
            }
        }

        self.shutdown.cancel();
        while !self.in_flight.is_empty() {
            match self.completions.recv().await {
                Some(completion) => self.finish(completion).await,
                None => break,
            }
        }
        tracing::debug!("Session host stopped");
    }

    async fn dispatch(&mut self, envelope: Envelope) {
        let Envelope {
            id,
            request,
            token,
            reply,
        } = envelope;
        tracing::debug!("{id}: {request:?}");

        if token.is_cancelled() {
            let _ = reply.send(Err(Error::Cancelled));
            return;
        }

        let result = match request {
            Request::List => Ok(Response::Documents(self.summaries(|_| true))),
            Request::Create { title } => Ok(Response::Created(self.session.create(&title))),
            Request::Edit { id: doc, body } => {
                match self.ensure_not_busy((TransferKind::Download, Some(doc))) {
                    Ok(()) => self
                        .session
                        .edit(&doc, &body)
                        .map(|changed| Response::Edited { id: doc, changed }),
                    Err(error) => Err(error),
                }
            }
            Request::Search(keyword) => {
                let hits = self
                    .session
                    .search(&keyword)
                    .into_iter()
                    .map(DocumentRecord::id)
                    .collect::<HashSet<_>>();
                Ok(Response::SearchResults(
                    self.summaries(|record| hits.contains(&record.id())),
                ))
            }
            Request::CloseTab(doc) => {
                self.session.close_tab(&doc);
                Ok(Response::TabClosed(doc))
            }
            Request::Import(paths) => self.session.import(paths).map(Response::Imported),
            Request::Rename { id: doc, title } => match self.ensure_idle(&doc) {
                Ok(()) => self
                    .session
                    .rename(&doc, &title)
                    .await
                    .map(|()| Response::Renamed(doc)),
                Err(error) => Err(error),
            },
            Request::Delete(doc) => match self.ensure_idle(&doc) {
                Ok(()) => self
                    .session
                    .delete(&doc)
                    .await
                    .map(|()| Response::Deleted(doc)),
                Err(error) => Err(error),
            },
            Request::Open(doc) => return self.open(id, doc, token, reply).await,
            Request::Save(doc) => return self.save(id, doc, token, reply).await,
            Request::UploadOne(doc) => {
                return self.upload(id, doc, AfterUpload::Uploaded, token, reply).await
            }
            Request::DownloadOne(doc) => {
                return self.download(id, doc, AfterDownload::Downloaded, token, reply);
            }
            Request::UploadAll => return self.upload_all(id, token, reply),
        };

        if let Err(error) = &result {
            tracing::debug!("{id} failed: {error}");
        }
        let _ = reply.send(result);
    }

    async fn open(
        &mut self,
        id: RequestId,
        doc: DocumentId,
        token: CancellationToken,
        reply: Reply,
    ) {
        if let Err(error) = self.ensure_not_busy((TransferKind::Download, Some(doc))) {
            let _ = reply.send(Err(error));
            return;
        }
        let result = match self.session.plan_open(&doc) {
            Ok(OpenPlan::Ready) => self.opened(doc, None),
            Ok(OpenPlan::ReadLocal) => match self.session.load_local(&doc).await {
                Ok(()) => self.opened(doc, None),
                Err(error) => Err(error),
            },
            Ok(OpenPlan::Download(job)) => {
                self.spawn_download(id, job, AfterDownload::Opened, token, reply);
                return;
            }
            Err(error) => Err(error),
        };
        let _ = reply.send(result);
    }

    async fn save(
        &mut self,
        id: RequestId,
        doc: DocumentId,
        token: CancellationToken,
        reply: Reply,
    ) {
        if let Err(error) = self.session.write_body(&doc).await {
            let _ = reply.send(Err(error));
            return;
        }
        if self.session.settings().is_auto_sync() {
            self.upload(id, doc, AfterUpload::Saved, token, reply).await;
        } else {
            let _ = reply.send(Ok(Response::Saved(doc)));
        }
    }

    async fn upload(
        &mut self,
        id: RequestId,
        doc: DocumentId,
        then: AfterUpload,
        token: CancellationToken,
        reply: Reply,
    ) {
        let key = (TransferKind::Upload, Some(doc));
        if let Err(error) = self.ensure_not_busy(key) {
            let _ = reply.send(Err(error));
            return;
        }
        let job = match self.session.prepare_upload(&doc).await {
            Ok(job) => job,
            Err(error) => {
                let _ = reply.send(Err(error));
                return;
            }
        };

        let sync = self.session.orchestrator().clone();
        let settings = self.session.settings().clone();
        self.spawn_transfer(id, key, token, reply, async move {
            let result = sync.upload_one(&settings, &job.key, &job.path).await;
            Outcome::Upload { job, then, result }
        });
    }

    fn download(
        &mut self,
        id: RequestId,
        doc: DocumentId,
        then: AfterDownload,
        token: CancellationToken,
        reply: Reply,
    ) {
        if let Err(error) = self.ensure_not_busy((TransferKind::Download, Some(doc))) {
            let _ = reply.send(Err(error));
            return;
        }
        match self.session.prepare_download(&doc) {
            Ok(job) => self.spawn_download(id, job, then, token, reply),
            Err(error) => {
                let _ = reply.send(Err(error));
            }
        }
    }

    fn spawn_download(
        &mut self,
        id: RequestId,
        job: DownloadJob,
        then: AfterDownload,
        token: CancellationToken,
        reply: Reply,
    ) {
        let key = (TransferKind::Download, Some(job.id));
        let sync = self.session.orchestrator().clone();
        let settings = self.session.settings().clone();
        self.spawn_transfer(id, key, token, reply, async move {
            let result = sync
                .download_one(&settings, &job.key, &job.path, job.local_updated_at)
                .await;
            Outcome::Download { job, then, result }
        });
    }

    fn upload_all(&mut self, id: RequestId, token: CancellationToken, reply: Reply) {
        let key = (TransferKind::UploadAll, None);
        if let Err(error) = self.ensure_not_busy(key) {
            let _ = reply.send(Err(error));
            return;
        }
        let batch = match self.session.prepare_upload_all() {
            Ok(batch) => batch,
            Err(error) => {
                let _ = reply.send(Err(error));
                return;
            }
        };

        let sync = self.session.orchestrator().clone();
        let settings = self.session.settings().clone();
        self.spawn_transfer(id, key, token, reply, async move {
            let result = sync.upload_all(&settings, &batch.rows).await;
            Outcome::UploadAll { batch, result }
        });
    }

    /// Run `transfer` on its own task, racing it against cancellation.
    fn spawn_transfer(
        &mut self,
        request: RequestId,
        key: TransferKey,
        token: CancellationToken,
        reply: Reply,
        transfer: impl std::future::Future<Output = Outcome> + Send + 'static,
    ) {
        self.in_flight.insert(key);
        self.publish_state();

        let completions = self.completions_tx.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                () = token.cancelled() => None,
                () = shutdown.cancelled() => None,
                outcome = transfer => Some(outcome),
            };
            let _ = completions.send(Completion {
                request,
                key,
                reply,
                outcome,
            });
        });
    }

    async fn finish(&mut self, completion: Completion) {
        let Completion {
            request,
            key,
            reply,
            outcome,
        } = completion;
        self.in_flight.remove(&key);

        let result = match outcome {
            None => {
                if let (TransferKind::Download, Some(doc)) = key {
                    self.session.abort_loading(&doc);
                }
                tracing::info!("{request}: {} cancelled", describe(key));
                Err(Error::Cancelled)
            }
            Some(Outcome::Upload { job, then, result }) => {
                self.session.apply_upload(&job, result).map(|()| match then {
                    AfterUpload::Uploaded => Response::Uploaded(job.id),
                    AfterUpload::Saved => Response::Saved(job.id),
                })
            }
            Some(Outcome::Download { job, then, result }) => {
                match self.session.apply_download(&job, result).await {
                    Ok(status) => match then {
                        AfterDownload::Downloaded => Ok(Response::Downloaded {
                            id: job.id,
                            status,
                        }),
                        AfterDownload::Opened => self.opened(job.id, Some(status)),
                    },
                    Err(error) => Err(error),
                }
            }
            Some(Outcome::UploadAll { batch, result }) => self
                .session
                .apply_upload_all(&batch, result)
                .map(Response::BatchUploaded),
        };

        if let Err(error) = &result {
            tracing::debug!("{request} failed: {error}");
        }
        self.publish_state();
        let _ = reply.send(result);
    }

    fn opened(&self, doc: DocumentId, download: Option<DownloadStatus>) -> Result<Response> {
        let record = self.session.document(&doc)?;
        let body = record
            .body()
            .ok_or_else(|| Error::InvalidInput(format!("Document {doc} has no body loaded")))?;
        Ok(Response::Opened {
            id: doc,
            body: body.to_string(),
            download,
        })
    }

    fn summaries(&self, keep: impl Fn(&DocumentRecord) -> bool) -> Vec<DocumentSummary> {
        let registry = self.session.registry();
        registry
            .iter()
            .filter(|record| keep(record))
            .map(|record| DocumentSummary::new(record, registry.is_unsaved(&record.id())))
            .collect()
    }

    fn ensure_not_busy(&self, key: TransferKey) -> Result<()> {
        if self.in_flight.contains(&key) {
            return Err(Error::Busy(describe(key)));
        }
        Ok(())
    }

    /// Reject moving or removing a document while any transfer touches it.
    /// A bulk upload touches every document.
    fn ensure_idle(&self, doc: &DocumentId) -> Result<()> {
        match self
            .in_flight
            .iter()
            .find(|(kind, id)| *kind == TransferKind::UploadAll || id.as_ref() == Some(doc))
        {
            Some(key) => Err(Error::Busy(describe(*key))),
            None => Ok(()),
        }
    }

    fn publish_state(&self) {
        let next = if self.in_flight.is_empty() {
            idle_state(&self.session)
        } else {
            SyncState::Syncing
        };
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

fn idle_state<F, M, R>(session: &Session<F, M, R>) -> SyncState
where
    F: LocalFiles,
    M: MetadataStore,
    R: ObjectStore,
{
    if session.settings().is_sync_configured() {
        SyncState::Idle
    } else {
        SyncState::Offline
    }
}

fn describe(key: TransferKey) -> String {
    let kind = match key.0 {
        TransferKind::Upload => "upload",
        TransferKind::Download => "download",
        TransferKind::UploadAll => "upload-all",
    };
    match key.1 {
        Some(doc) => format!("{kind} of {doc}"),
        None => kind.to_string(),
    }
}
