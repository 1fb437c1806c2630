//! Error types for cloudnote-core

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using cloudnote-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in cloudnote-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local file read/write/rename/delete failed
    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Remote object does not exist (a legitimate "no file yet" outcome)
    #[error("Remote object not found: {0}")]
    RemoteNotFound(String),

    /// Network or credential failure talking to the object store
    #[error("Sync failed, check your sync configuration: {0}")]
    RemoteTransfer(String),

    /// Rename target title already used by another document
    #[error("A document titled '{0}' already exists")]
    NameCollision(String),

    /// Document not found
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Network operation requested while credentials are incomplete
    #[error("Sync is not configured: access key, secret key and bucket name are required")]
    SyncNotConfigured,

    /// Same operation already in flight for this document
    #[error("Operation already in progress: {0}")]
    Busy(String),

    /// Request was cancelled before completion
    #[error("Request cancelled")]
    Cancelled,

    /// Session host channel closed
    #[error("Session channel error: {0}")]
    Channel(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap an IO failure with the path it happened on.
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Whether this error came from the remote store (as opposed to local state).
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteNotFound(_) | Self::RemoteTransfer(_))
    }
}
