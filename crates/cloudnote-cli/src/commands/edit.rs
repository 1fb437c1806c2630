use std::path::Path;

use cloudnote_core::services::{Request, Response};

use crate::commands::common::{
    capture_editor_input_with_initial, normalize_document_identifier, open_document, open_host,
    resolve_document, unexpected,
};
use crate::error::CliError;

pub async fn run_edit(id: &str, data_dir: &Path) -> Result<(), CliError> {
    let normalized_id = normalize_document_identifier(id)?;
    let handle = open_host(data_dir)?;
    let document = resolve_document(&normalized_id, &handle).await?;
    let (body, _) = open_document(document.id, &handle).await?;

    let edited = capture_editor_input_with_initial(&body)?;
    let changed = match handle
        .request(Request::Edit {
            id: document.id,
            body: edited,
        })
        .await?
    {
        Response::Edited { changed, .. } => changed,
        other => return Err(unexpected("Edited", &other)),
    };

    if changed {
        handle.request(Request::Save(document.id)).await?;
    }
    println!("{}", document.id);
    Ok(())
}
