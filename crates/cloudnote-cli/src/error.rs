use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] cloudnote_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Document ID cannot be empty")]
    EmptyDocumentId,
    #[error("Search query cannot be empty")]
    EmptySearchQuery,
    #[error("Document not found for id/prefix/title: {0}")]
    DocumentNotFound(String),
    #[error("{0}")]
    AmbiguousDocumentId(String),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("Not a Markdown file: {}", .0.display())]
    NotMarkdown(PathBuf),
    #[error("Unexpected reply from session host: expected {expected}, got {actual}")]
    UnexpectedResponse {
        expected: &'static str,
        actual: String,
    },
}
