use std::path::Path;

use cloudnote_core::services::Request;

use crate::commands::common::{normalize_document_identifier, open_host, resolve_document};
use crate::error::CliError;

pub async fn run_rename(id: &str, title: &str, data_dir: &Path) -> Result<(), CliError> {
    let normalized_id = normalize_document_identifier(id)?;
    let handle = open_host(data_dir)?;
    let document = resolve_document(&normalized_id, &handle).await?;

    handle
        .request(Request::Rename {
            id: document.id,
            title: title.to_string(),
        })
        .await?;
    println!("{}", document.id);
    Ok(())
}
