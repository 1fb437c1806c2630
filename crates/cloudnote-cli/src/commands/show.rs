use std::path::Path;

use cloudnote_core::sync::DownloadStatus;

use crate::commands::common::{
    normalize_document_identifier, open_document, open_host, resolve_document,
};
use crate::error::CliError;

pub async fn run_show(id: &str, data_dir: &Path) -> Result<(), CliError> {
    let normalized_id = normalize_document_identifier(id)?;
    let handle = open_host(data_dir)?;
    let document = resolve_document(&normalized_id, &handle).await?;

    let (body, download) = open_document(document.id, &handle).await?;
    if download == Some(DownloadStatus::DownloadSuccess) {
        eprintln!("Pulled newer copy of '{}' from the bucket", document.title);
    }
    println!("{body}");
    Ok(())
}
