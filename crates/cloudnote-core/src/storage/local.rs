//! Local Markdown file I/O.

use std::future::Future;
use std::path::Path;

use crate::{Error, Result};

/// Text file operations the registry performs on document paths.
///
/// Every failure is reported as [`Error::Filesystem`] carrying the path.
pub trait LocalFiles: Send + Sync + 'static {
    /// Read the whole file as UTF-8 text
    fn read(&self, path: &Path) -> impl Future<Output = Result<String>> + Send;

    /// Create or overwrite the file (parent directories are created)
    fn write(&self, path: &Path, text: &str) -> impl Future<Output = Result<()>> + Send;

    /// Move a file to a new path
    fn rename(&self, from: &Path, to: &Path) -> impl Future<Output = Result<()>> + Send;

    /// Remove a file
    fn delete(&self, path: &Path) -> impl Future<Output = Result<()>> + Send;
}

/// `tokio::fs` implementation of [`LocalFiles`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFiles;

impl LocalFiles for TokioFiles {
    async fn read(&self, path: &Path) -> Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|error| Error::filesystem(path, error))
    }

    async fn write(&self, path: &Path, text: &str) -> Result<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|error| Error::filesystem(parent, error))?;
        }
        tokio::fs::write(path, text)
            .await
            .map_err(|error| Error::filesystem(path, error))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        tokio::fs::rename(from, to)
            .await
            .map_err(|error| Error::filesystem(from, error))
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        tokio::fs::remove_file(path)
            .await
            .map_err(|error| Error::filesystem(path, error))
    }
}
