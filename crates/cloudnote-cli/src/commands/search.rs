use std::path::Path;

use crate::commands::common::{
    document_to_list_item, format_document_lines, normalize_search_query, open_host,
    search_documents, DocumentListItem,
};
use crate::error::CliError;

pub async fn run_search(query: &str, as_json: bool, data_dir: &Path) -> Result<(), CliError> {
    let query = normalize_search_query(query)?;
    let handle = open_host(data_dir)?;
    let documents = search_documents(&query, &handle).await?;

    if as_json {
        let json_items = documents
            .iter()
            .map(document_to_list_item)
            .collect::<Vec<DocumentListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if documents.is_empty() {
        println!("No documents matching '{query}'.");
        return Ok(());
    }

    for line in format_document_lines(&documents) {
        println!("{line}");
    }
    Ok(())
}
