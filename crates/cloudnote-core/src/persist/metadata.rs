//! Metadata store: the durable shadow of the document registry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::{read_json, write_json};
use crate::error::{Error, Result};
use crate::models::DocumentMeta;

/// Trait for metadata storage operations
pub trait MetadataStore: Send + Sync + 'static {
    /// Load every persisted row, ordered by document id
    fn load(&self) -> Result<Vec<DocumentMeta>>;

    /// Replace the whole store with `rows`
    fn save_all(&self, rows: &[DocumentMeta]) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FilesDocument {
    #[serde(default)]
    files: BTreeMap<String, DocumentMeta>,
}

impl FilesDocument {
    fn from_rows(rows: &[DocumentMeta]) -> Self {
        Self {
            files: rows
                .iter()
                .map(|row| (row.id.as_str(), row.clone()))
                .collect(),
        }
    }
}

/// JSON file implementation of `MetadataStore`
#[derive(Debug, Clone)]
pub struct JsonMetadataStore {
    path: PathBuf,
}

impl JsonMetadataStore {
    /// Create a store backed by the JSON document at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetadataStore for JsonMetadataStore {
    fn load(&self) -> Result<Vec<DocumentMeta>> {
        let document: Option<FilesDocument> = read_json(&self.path)?;
        Ok(document
            .map(|document| document.files.into_values().collect())
            .unwrap_or_default())
    }

    fn save_all(&self, rows: &[DocumentMeta]) -> Result<()> {
        write_json(&self.path, &FilesDocument::from_rows(rows))?;
        tracing::debug!(
            "Persisted {} document rows to {}",
            rows.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// In-memory `MetadataStore` (primarily for tests)
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    rows: Mutex<Vec<DocumentMeta>>,
    saves: Mutex<usize>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with rows, as if a previous session had saved them
    pub fn with_rows(rows: Vec<DocumentMeta>) -> Self {
        Self {
            rows: Mutex::new(rows),
            saves: Mutex::new(0),
        }
    }

    /// Number of `save_all` calls so far
    pub fn save_count(&self) -> usize {
        self.saves.lock().map_or(0, |saves| *saves)
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn load(&self) -> Result<Vec<DocumentMeta>> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| Error::InvalidInput("metadata store lock poisoned".to_string()))?
            .clone();
        rows.sort_by_key(|row| row.id);
        Ok(rows)
    }

    fn save_all(&self, rows: &[DocumentMeta]) -> Result<()> {
        let mut stored = self
            .rows
            .lock()
            .map_err(|_| Error::InvalidInput("metadata store lock poisoned".to_string()))?;
        *stored = rows.to_vec();
        if let Ok(mut saves) = self.saves.lock() {
            *saves += 1;
        }
        Ok(())
    }
}
