use std::path::{Path, PathBuf};

use cloudnote_core::models::MARKDOWN_EXTENSION;
use cloudnote_core::services::{Request, Response};
use cloudnote_core::DocumentId;

use crate::commands::common::{open_host, unexpected};
use crate::error::CliError;

pub async fn run_import(paths: &[PathBuf], data_dir: &Path) -> Result<Vec<DocumentId>, CliError> {
    let paths = paths
        .iter()
        .map(|path| normalize_import_path(path))
        .collect::<Result<Vec<_>, _>>()?;
    let requested = paths.len();

    let handle = open_host(data_dir)?;
    let ids = match handle.request(Request::Import(paths)).await? {
        Response::Imported(ids) => ids,
        other => return Err(unexpected("Imported", &other)),
    };

    for id in &ids {
        println!("{id}");
    }
    let skipped = requested - ids.len();
    if skipped > 0 {
        eprintln!("Skipped {skipped} already imported file(s)");
    }
    Ok(ids)
}

/// Absolute path of an existing Markdown file.
pub fn normalize_import_path(path: &Path) -> Result<PathBuf, CliError> {
    let is_markdown = path
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case(MARKDOWN_EXTENSION));
    if !is_markdown {
        return Err(CliError::NotMarkdown(path.to_path_buf()));
    }
    Ok(std::fs::canonicalize(path)?)
}
