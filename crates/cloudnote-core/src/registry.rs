//! In-memory document state registry.
//!
//! Holds every [`DocumentRecord`] of the editing session together with the
//! open-tab list, the active document and the set of documents with unsaved
//! edits. The registry performs no I/O; operations that touch disk are
//! sequenced by [`Session`](crate::services::Session), which only commits
//! here after the disk operation succeeded.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::models::{DocumentId, DocumentMeta, DocumentRecord, MARKDOWN_EXTENSION};

/// Document registry for one editing session
#[derive(Debug, Default)]
pub struct DocumentRegistry {
    documents: BTreeMap<DocumentId, DocumentRecord>,
    open_tabs: Vec<DocumentId>,
    active: Option<DocumentId>,
    unsaved: BTreeSet<DocumentId>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the registry from persisted rows; nothing is loaded yet.
    pub fn from_meta(rows: impl IntoIterator<Item = DocumentMeta>) -> Self {
        let documents = rows
            .into_iter()
            .map(|row| (row.id, DocumentRecord::from_meta(row)))
            .collect();
        Self {
            documents,
            ..Self::default()
        }
    }

    /// Allocate a new unsaved document.
    pub fn create(&mut self, title: impl Into<String>) -> DocumentId {
        let record = DocumentRecord::draft(title);
        let id = record.id();
        self.documents.insert(id, record);
        id
    }

    /// Track an already-built record (imports).
    pub fn insert(&mut self, record: DocumentRecord) -> DocumentId {
        let id = record.id();
        self.documents.insert(id, record);
        id
    }

    pub fn get(&self, id: &DocumentId) -> Option<&DocumentRecord> {
        self.documents.get(id)
    }

    pub fn get_mut(&mut self, id: &DocumentId) -> Option<&mut DocumentRecord> {
        self.documents.get_mut(id)
    }

    /// Like [`get`](Self::get) but reports a missing id as an error.
    pub fn require(&self, id: &DocumentId) -> Result<&DocumentRecord> {
        self.documents
            .get(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    pub fn require_mut(&mut self, id: &DocumentId) -> Result<&mut DocumentRecord> {
        self.documents
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// All records in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &DocumentRecord> {
        self.documents.values()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Whether any record already points at `path`.
    pub fn tracks_path(&self, path: &Path) -> bool {
        self.documents
            .values()
            .any(|record| record.path() == Some(path))
    }

    /// Replace a document's body.
    ///
    /// Returns `false` when the body is unchanged; otherwise the document
    /// joins the unsaved set and loses its synced state.
    pub fn edit(&mut self, id: &DocumentId, body: impl Into<String>) -> Result<bool> {
        let record = self.require_mut(id)?;
        if !record.is_loaded() {
            return Err(Error::InvalidInput(format!(
                "Document {id} is not loaded; open it before editing"
            )));
        }
        if !record.set_body(body) {
            return Ok(false);
        }
        self.unsaved.insert(*id);
        Ok(true)
    }

    /// Validate a proposed title for `id`: well-formed and not used by any
    /// other document.
    pub fn validate_title(&self, id: &DocumentId, title: &str) -> Result<String> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::InvalidInput("Title cannot be empty".to_string()));
        }
        if invalid_title_chars().is_match(title) || title == "." || title == ".." {
            return Err(Error::InvalidInput(format!(
                "Title '{title}' contains characters not allowed in file names"
            )));
        }
        let taken = self
            .documents
            .values()
            .any(|record| record.id() != *id && record.title() == title);
        if taken {
            return Err(Error::NameCollision(title.to_string()));
        }
        Ok(title.to_string())
    }

    /// Path a document should live at after taking `title`: next to its
    /// current file, or inside `default_dir` for drafts.
    pub fn path_for_title(
        &self,
        id: &DocumentId,
        title: &str,
        default_dir: &Path,
    ) -> Result<PathBuf> {
        let record = self.require(id)?;
        let file_name = format!("{title}.{MARKDOWN_EXTENSION}");
        let dir = record
            .path()
            .filter(|_| !record.is_new())
            .and_then(Path::parent)
            .unwrap_or(default_dir);
        Ok(dir.join(file_name))
    }

    /// Drop a document and forget it in tab and unsaved tracking.
    pub fn remove(&mut self, id: &DocumentId) -> Option<DocumentRecord> {
        let removed = self.documents.remove(id)?;
        self.unsaved.remove(id);
        self.close_tab(id);
        Some(removed)
    }

    /// Records whose title contains `keyword` (case-sensitive), in order.
    pub fn search(&self, keyword: &str) -> Vec<&DocumentRecord> {
        self.documents
            .values()
            .filter(|record| record.title().contains(keyword))
            .collect()
    }

    /// Add `id` to the open tabs (once) and make it active.
    pub fn open_tab(&mut self, id: &DocumentId) {
        if !self.open_tabs.contains(id) {
            self.open_tabs.push(*id);
        }
        self.active = Some(*id);
    }

    /// Close a tab; the first remaining tab becomes active.
    pub fn close_tab(&mut self, id: &DocumentId) {
        self.open_tabs.retain(|open| open != id);
        if self.active == Some(*id) || self.open_tabs.is_empty() {
            self.active = self.open_tabs.first().copied();
        }
    }

    pub fn open_tabs(&self) -> &[DocumentId] {
        &self.open_tabs
    }

    pub const fn active(&self) -> Option<DocumentId> {
        self.active
    }

    pub fn is_unsaved(&self, id: &DocumentId) -> bool {
        self.unsaved.contains(id)
    }

    pub fn mark_saved(&mut self, id: &DocumentId) {
        self.unsaved.remove(id);
    }

    /// Persisted projection of every non-draft record.
    pub fn snapshot_meta(&self) -> Vec<DocumentMeta> {
        self.documents
            .values()
            .filter_map(DocumentRecord::to_meta)
            .collect()
    }
}

fn invalid_title_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[/\\:*?"<>|\x00-\x1f]"#).expect("Invalid regex"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn persisted(title: &str) -> DocumentMeta {
        DocumentMeta {
            id: DocumentId::new(),
            path: PathBuf::from(format!("/notes/{title}.md")),
            title: title.to_string(),
            created_at: 1,
            updated_at: None,
            is_synced: false,
        }
    }

    fn loaded_registry(titles: &[&str]) -> (DocumentRegistry, Vec<DocumentId>) {
        let rows: Vec<_> = titles.iter().map(|title| persisted(title)).collect();
        let ids = rows.iter().map(|row| row.id).collect();
        let mut registry = DocumentRegistry::from_meta(rows);
        for id in &ids {
            registry.get_mut(id).unwrap().finish_loading("body");
        }
        (registry, ids)
    }

    #[test]
    fn test_create_is_draft_and_not_persisted() {
        let mut registry = DocumentRegistry::new();
        let id = registry.create("");
        assert!(registry.get(&id).unwrap().is_new());
        assert!(registry.snapshot_meta().is_empty());
    }

    #[test]
    fn test_same_body_edit_does_not_mark_unsaved() {
        let (mut registry, ids) = loaded_registry(&["a"]);
        assert!(!registry.edit(&ids[0], "body").unwrap());
        assert!(!registry.is_unsaved(&ids[0]));
    }

    #[test]
    fn test_edit_marks_unsaved() {
        let (mut registry, ids) = loaded_registry(&["a"]);
        assert!(registry.edit(&ids[0], "changed").unwrap());
        assert!(registry.is_unsaved(&ids[0]));
        registry.mark_saved(&ids[0]);
        assert!(!registry.is_unsaved(&ids[0]));
    }

    #[test]
    fn test_edit_requires_loaded_body() {
        let mut registry = DocumentRegistry::from_meta(vec![persisted("a")]);
        let id = registry.iter().next().unwrap().id();
        assert!(matches!(
            registry.edit(&id, "x"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_validate_title_rejects_collision_but_allows_self() {
        let (registry, ids) = loaded_registry(&["plan", "notes"]);
        assert!(matches!(
            registry.validate_title(&ids[1], "plan"),
            Err(Error::NameCollision(title)) if title == "plan"
        ));
        assert_eq!(registry.validate_title(&ids[0], " plan ").unwrap(), "plan");
    }

    #[test]
    fn test_validate_title_rejects_malformed() {
        let (registry, ids) = loaded_registry(&["a"]);
        for bad in ["", "   ", "a/b", "what?", "..", "tab\there"] {
            assert!(
                matches!(registry.validate_title(&ids[0], bad), Err(Error::InvalidInput(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_path_for_title() {
        let (mut registry, ids) = loaded_registry(&["a"]);
        let default_dir = Path::new("/default");
        assert_eq!(
            registry.path_for_title(&ids[0], "b", default_dir).unwrap(),
            PathBuf::from("/notes/b.md")
        );

        let draft = registry.create("");
        assert_eq!(
            registry.path_for_title(&draft, "new", default_dir).unwrap(),
            PathBuf::from("/default/new.md")
        );
    }

    #[test]
    fn test_search_is_ordered_case_sensitive_and_non_destructive() {
        let (registry, ids) = loaded_registry(&["Rust notes", "rust tips", "Rusty", "Go"]);
        let hits: Vec<_> = registry
            .search("Rust")
            .into_iter()
            .map(DocumentRecord::id)
            .collect();
        assert_eq!(hits, vec![ids[0], ids[2]]);
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.search("").len(), 4);
    }

    #[test]
    fn test_tabs_and_active_fallback() {
        let (mut registry, ids) = loaded_registry(&["a", "b", "c"]);
        registry.open_tab(&ids[0]);
        registry.open_tab(&ids[1]);
        registry.open_tab(&ids[1]);
        assert_eq!(registry.open_tabs(), &[ids[0], ids[1]]);
        assert_eq!(registry.active(), Some(ids[1]));

        registry.close_tab(&ids[1]);
        assert_eq!(registry.active(), Some(ids[0]));
        registry.close_tab(&ids[0]);
        assert_eq!(registry.active(), None);
    }

    #[test]
    fn test_remove_clears_tracking() {
        let (mut registry, ids) = loaded_registry(&["a"]);
        registry.open_tab(&ids[0]);
        registry.edit(&ids[0], "dirty").unwrap();

        assert!(registry.remove(&ids[0]).is_some());
        assert!(registry.open_tabs().is_empty());
        assert!(!registry.is_unsaved(&ids[0]));
        assert!(registry.remove(&ids[0]).is_none());
    }

    #[test]
    fn test_tracks_path() {
        let (registry, _) = loaded_registry(&["a"]);
        assert!(registry.tracks_path(Path::new("/notes/a.md")));
        assert!(!registry.tracks_path(Path::new("/notes/b.md")));
    }
}
