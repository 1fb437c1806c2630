//! Document model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

use crate::util::now_millis;

/// Body given to a freshly created document before the user types anything.
pub const DRAFT_PLACEHOLDER: &str = "##";

/// File extension used for documents on disk and for remote object keys.
pub const MARKDOWN_EXTENSION: &str = "md";

/// A unique identifier for a document, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Create a new unique document ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DocumentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Where a document stands relative to disk and the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum Lifecycle {
    /// Created in memory, never written to disk.
    Draft,
    /// Durable on disk, not confirmed equal to the remote copy.
    LocalOnly,
    /// Body load or download in flight. `synced` is the state to return to.
    Loading { synced: bool },
    /// Confirmed equal to the remote copy.
    Synced,
    /// Was synced, edited or renamed since.
    Stale,
}

/// Persisted projection of a document (everything except body and session state)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub id: DocumentId,
    pub path: PathBuf,
    pub title: String,
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub is_synced: bool,
}

impl DocumentMeta {
    /// Remote object key for this row.
    pub fn object_key(&self) -> String {
        object_key_for(&self.title)
    }
}

/// A document in the editing session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    id: DocumentId,
    title: String,
    path: Option<PathBuf>,
    body: Option<String>,
    created_at: i64,
    updated_at: Option<i64>,
    lifecycle: Lifecycle,
    /// Bumped whenever the body or location changes.
    revision: u64,
}

impl DocumentRecord {
    /// Create an unsaved document holding the placeholder body.
    #[must_use]
    pub fn draft(title: impl Into<String>) -> Self {
        Self {
            id: DocumentId::new(),
            title: title.into(),
            path: None,
            body: Some(DRAFT_PLACEHOLDER.to_string()),
            created_at: now_millis(),
            updated_at: None,
            lifecycle: Lifecycle::Draft,
            revision: 0,
        }
    }

    /// Track an existing Markdown file; the title is its file stem and the
    /// body is loaded lazily on open.
    #[must_use]
    pub fn imported(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            id: DocumentId::new(),
            title,
            path: Some(path),
            body: None,
            created_at: now_millis(),
            updated_at: None,
            lifecycle: Lifecycle::LocalOnly,
            revision: 0,
        }
    }

    /// Rebuild an unloaded record from its persisted row.
    #[must_use]
    pub fn from_meta(meta: DocumentMeta) -> Self {
        Self {
            id: meta.id,
            title: meta.title,
            path: Some(meta.path),
            body: None,
            created_at: meta.created_at,
            updated_at: meta.updated_at,
            lifecycle: if meta.is_synced {
                Lifecycle::Synced
            } else {
                Lifecycle::LocalOnly
            },
            revision: 0,
        }
    }

    /// Persisted projection; drafts have none.
    pub fn to_meta(&self) -> Option<DocumentMeta> {
        let path = self.path.clone()?;
        if self.is_new() {
            return None;
        }
        Some(DocumentMeta {
            id: self.id,
            path,
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            is_synced: self.is_synced(),
        })
    }

    pub const fn id(&self) -> DocumentId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub const fn created_at(&self) -> i64 {
        self.created_at
    }

    pub const fn updated_at(&self) -> Option<i64> {
        self.updated_at
    }

    pub const fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub const fn revision(&self) -> u64 {
        self.revision
    }

    pub const fn is_new(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Draft)
    }

    pub const fn is_loaded(&self) -> bool {
        self.body.is_some()
    }

    pub const fn is_loading(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Loading { .. })
    }

    pub const fn is_synced(&self) -> bool {
        matches!(
            self.lifecycle,
            Lifecycle::Synced | Lifecycle::Loading { synced: true }
        )
    }

    /// Remote object key, `"<title>.md"`.
    pub fn object_key(&self) -> String {
        object_key_for(&self.title)
    }

    /// Replace the body. Returns `false` (and changes nothing) when the body
    /// is identical; any real change invalidates sync state.
    pub fn set_body(&mut self, body: impl Into<String>) -> bool {
        let body = body.into();
        if self.body.as_deref() == Some(body.as_str()) {
            return false;
        }
        self.body = Some(body);
        self.revision += 1;
        self.invalidate_sync();
        true
    }

    /// Commit a new title and path after the file landed there on disk.
    pub fn commit_location(&mut self, title: impl Into<String>, path: impl Into<PathBuf>) {
        let title = title.into();
        let renamed = title != self.title;
        self.title = title;
        self.path = Some(path.into());
        self.revision += 1;
        if self.is_new() {
            self.lifecycle = Lifecycle::LocalOnly;
        } else if renamed {
            // The remote object still sits under the old key.
            self.invalidate_sync();
        }
    }

    pub fn begin_loading(&mut self) {
        match self.lifecycle {
            Lifecycle::Draft | Lifecycle::Loading { .. } => {}
            Lifecycle::Synced => self.lifecycle = Lifecycle::Loading { synced: true },
            Lifecycle::LocalOnly | Lifecycle::Stale => {
                self.lifecycle = Lifecycle::Loading { synced: false };
            }
        }
    }

    /// Populate the body from the local file without touching sync state.
    pub fn finish_loading(&mut self, body: impl Into<String>) {
        self.body = Some(body.into());
        self.end_loading();
    }

    /// Leave the loading state without a body (load failed or was cancelled).
    pub fn abort_loading(&mut self) {
        self.end_loading();
    }

    /// Populate the body from a download that won against the local copy.
    pub fn finish_download(&mut self, body: impl Into<String>, now: i64) {
        self.body = Some(body.into());
        self.revision += 1;
        self.lifecycle = Lifecycle::Synced;
        self.updated_at = Some(now);
    }

    /// Record a confirmed upload of the content at `revision`. Returns
    /// `false` when the document changed since, leaving it unsynced.
    pub fn mark_synced(&mut self, revision: u64, now: i64) -> bool {
        if self.is_new() || self.revision != revision {
            return false;
        }
        self.lifecycle = Lifecycle::Synced;
        self.updated_at = Some(now);
        true
    }

    fn end_loading(&mut self) {
        if let Lifecycle::Loading { synced } = self.lifecycle {
            self.lifecycle = if synced {
                Lifecycle::Synced
            } else {
                Lifecycle::LocalOnly
            };
        }
    }

    fn invalidate_sync(&mut self) {
        self.lifecycle = match self.lifecycle {
            Lifecycle::Synced => Lifecycle::Stale,
            Lifecycle::Loading { .. } => Lifecycle::Loading { synced: false },
            other => other,
        };
    }
}

/// Build the remote object key for a title.
pub fn object_key_for(title: &str) -> String {
    format!("{title}.{MARKDOWN_EXTENSION}")
}
