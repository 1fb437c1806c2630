use std::path::Path;

use crate::commands::common::{
    document_to_list_item, format_document_lines, list_documents, open_host, DocumentListItem,
};
use crate::error::CliError;

pub async fn run_list(as_json: bool, data_dir: &Path) -> Result<(), CliError> {
    let handle = open_host(data_dir)?;
    let documents = list_documents(&handle).await?;

    if as_json {
        let json_items = documents
            .iter()
            .map(document_to_list_item)
            .collect::<Vec<DocumentListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if documents.is_empty() {
        println!("No documents yet.");
    } else {
        for line in format_document_lines(&documents) {
            println!("{line}");
        }
    }

    Ok(())
}
