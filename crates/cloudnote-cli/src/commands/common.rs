use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use cloudnote_core::models::Lifecycle;
use cloudnote_core::services::{DocumentSummary, HostHandle, Request, Response, Workspace};
use cloudnote_core::sync::DownloadStatus;
use cloudnote_core::DocumentId;
use serde::Serialize;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct DocumentListItem {
    pub id: String,
    pub title: String,
    pub path: Option<String>,
    pub state: &'static str,
    pub unsaved: bool,
    pub created_at: i64,
    pub updated_at: Option<i64>,
    pub relative_time: Option<String>,
}

pub fn open_host(data_dir: &Path) -> Result<HostHandle, CliError> {
    let (handle, _task) = Workspace::open_path(data_dir)?.spawn_host()?;
    Ok(handle)
}

pub async fn list_documents(handle: &HostHandle) -> Result<Vec<DocumentSummary>, CliError> {
    match handle.request(Request::List).await? {
        Response::Documents(documents) => Ok(documents),
        other => Err(unexpected("Documents", &other)),
    }
}

pub async fn search_documents(
    query: &str,
    handle: &HostHandle,
) -> Result<Vec<DocumentSummary>, CliError> {
    match handle.request(Request::Search(query.to_string())).await? {
        Response::SearchResults(documents) => Ok(documents),
        other => Err(unexpected("SearchResults", &other)),
    }
}

/// Load a document's body, downloading first when auto-sync is on.
pub async fn open_document(
    id: DocumentId,
    handle: &HostHandle,
) -> Result<(String, Option<DownloadStatus>), CliError> {
    match handle.request(Request::Open(id)).await? {
        Response::Opened { body, download, .. } => Ok((body, download)),
        other => Err(unexpected("Opened", &other)),
    }
}

/// Find a document by exact ID, exact title or unique ID prefix.
pub async fn resolve_document(
    query: &str,
    handle: &HostHandle,
) -> Result<DocumentSummary, CliError> {
    let documents = list_documents(handle).await?;

    if let Ok(id) = query.parse::<DocumentId>() {
        if let Some(document) = documents.iter().find(|document| document.id == id) {
            return Ok(document.clone());
        }
    }

    if let Some(document) = documents.iter().find(|document| document.title == query) {
        return Ok(document.clone());
    }

    let matching = documents
        .iter()
        .filter(|document| document.id.as_str().starts_with(query))
        .collect::<Vec<_>>();

    match matching.as_slice() {
        [] => Err(CliError::DocumentNotFound(query.to_string())),
        [document] => Ok((*document).clone()),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|document| short_id(document.id))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousDocumentId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn unexpected(expected: &'static str, response: &Response) -> CliError {
    CliError::UnexpectedResponse {
        expected,
        actual: format!("{response:?}"),
    }
}

pub fn short_id(id: DocumentId) -> String {
    id.as_str().chars().take(13).collect()
}

pub const fn lifecycle_label(lifecycle: Lifecycle) -> &'static str {
    match lifecycle {
        Lifecycle::Draft => "draft",
        Lifecycle::LocalOnly => "local",
        Lifecycle::Loading { .. } => "loading",
        Lifecycle::Synced => "synced",
        Lifecycle::Stale => "modified",
    }
}

pub fn format_document_lines(documents: &[DocumentSummary]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    documents
        .iter()
        .map(|document| {
            let short_id = short_id(document.id);
            let title = truncate(&document.title, 40);
            let state = lifecycle_label(document.lifecycle);
            let relative_time = document
                .updated_at
                .map_or_else(|| "never synced".to_string(), |at| format_relative_time(at, now_ms));

            format!("{short_id:<13}  {title:<40}  {state:<8}  {relative_time}")
        })
        .collect()
}

pub fn document_to_list_item(document: &DocumentSummary) -> DocumentListItem {
    let now_ms = Utc::now().timestamp_millis();

    DocumentListItem {
        id: document.id.to_string(),
        title: document.title.clone(),
        path: document
            .path
            .as_ref()
            .map(|path| path.display().to_string()),
        state: lifecycle_label(document.lifecycle),
        unsaved: document.unsaved,
        created_at: document.created_at,
        updated_at: document.updated_at,
        relative_time: document
            .updated_at
            .map(|at| format_relative_time(at, now_ms)),
    }
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Content for a new document: arguments, then piped stdin, then the editor.
pub fn resolve_document_content(content_parts: &[String]) -> Result<Option<String>, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(Some(content));
    }

    if let Some(content) = read_piped_stdin()? {
        return Ok(Some(content));
    }

    Ok(normalize_content(&capture_editor_input_with_initial("")?))
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_search_query(query: &str) -> Result<String, CliError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptySearchQuery)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn normalize_document_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyDocumentId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

/// Let the user edit `initial_content` in their editor; returns the result
/// verbatim.
pub fn capture_editor_input_with_initial(initial_content: &str) -> Result<String, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_document_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(content)
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) => {
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let mut command = Command::new(program);
            command.args(parts).arg(file_path);

            let status = command.status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

pub fn create_temp_document_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("cloudnote-{}-{now}.md", std::process::id()))
}

pub fn resolve_data_dir(cli_data_dir: Option<PathBuf>) -> PathBuf {
    cli_data_dir
        .or_else(|| env::var_os("CLOUDNOTE_DATA_DIR").map(PathBuf::from))
        .unwrap_or_else(default_data_dir)
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cloudnote")
}
