use std::path::Path;

use cloudnote_core::services::{Request, Response};
use cloudnote_core::DocumentId;

use crate::commands::common::{open_host, resolve_document_content, unexpected};
use crate::error::CliError;

pub async fn run_new(
    title: &str,
    content_parts: &[String],
    data_dir: &Path,
) -> Result<DocumentId, CliError> {
    let content = resolve_document_content(content_parts)?;
    create_document(title, content, data_dir).await
}

/// Create, name and save a document in one go.
pub async fn create_document(
    title: &str,
    content: Option<String>,
    data_dir: &Path,
) -> Result<DocumentId, CliError> {
    let handle = open_host(data_dir)?;
    let id = match handle
        .request(Request::Create {
            title: String::new(),
        })
        .await?
    {
        Response::Created(id) => id,
        other => return Err(unexpected("Created", &other)),
    };

    if let Some(body) = content {
        handle.request(Request::Edit { id, body }).await?;
    }
    handle
        .request(Request::Rename {
            id,
            title: title.to_string(),
        })
        .await?;
    handle.request(Request::Save(id)).await?;

    println!("{id}");
    Ok(id)
}
