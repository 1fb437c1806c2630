use std::path::{Path, PathBuf};

use cloudnote_core::models::{DocumentMeta, Lifecycle};
use cloudnote_core::persist::{JsonMetadataStore, MetadataStore};
use cloudnote_core::services::Workspace;
use cloudnote_core::sync::BatchReport;
use cloudnote_core::DocumentId;
use pretty_assertions::assert_eq;

use crate::cli::CompletionShell;
use crate::commands::common::{
    default_editor, format_relative_time, format_sync_timestamp, lifecycle_label,
    list_documents, normalize_content, normalize_document_identifier, normalize_search_query,
    open_document, open_host, resolve_document, truncate,
};
use crate::commands::completions::{render_completions, run_completions};
use crate::commands::config::{run_config_check, run_config_set, SettingsView};
use crate::commands::delete::run_delete;
use crate::commands::import::{normalize_import_path, run_import};
use crate::commands::new::create_document;
use crate::commands::rename::run_rename;
use crate::commands::sync::{format_batch_report, run_sync_push, run_sync_push_all};
use crate::error::CliError;

struct TestDirs {
    _root: tempfile::TempDir,
    data: PathBuf,
    notes: PathBuf,
}

fn test_dirs() -> TestDirs {
    let root = tempfile::tempdir().unwrap();
    let data = root.path().join("data");
    let notes = root.path().join("notes");
    let workspace = Workspace::open_path(&data).unwrap();
    run_config_set(
        &workspace,
        "saved_file_location",
        &notes.display().to_string(),
    )
    .unwrap();
    TestDirs {
        _root: root,
        data,
        notes,
    }
}

fn seed_rows(data: &Path, ids: &[&str]) {
    let workspace = Workspace::open_path(data).unwrap();
    let rows = ids
        .iter()
        .enumerate()
        .map(|(index, id)| DocumentMeta {
            id: id.parse().unwrap(),
            path: data.join(format!("doc-{index}.md")),
            title: format!("doc-{index}"),
            created_at: 1_000,
            updated_at: None,
            is_synced: false,
        })
        .collect::<Vec<_>>();
    JsonMetadataStore::new(workspace.metadata_path())
        .save_all(&rows)
        .unwrap();
}

#[test]
fn normalize_content_trims_and_rejects_empty() {
    assert_eq!(normalize_content("  hello  "), Some("hello".to_string()));
    assert_eq!(normalize_content(" \n\t "), None);
}

#[test]
fn normalize_content_keeps_multiline_text() {
    assert_eq!(
        normalize_content("# Title\n\nbody\n"),
        Some("# Title\n\nbody".to_string())
    );
}

#[test]
fn default_editor_is_defined() {
    assert!(!default_editor().is_empty());
}

#[test]
fn normalize_search_query_rejects_empty() {
    assert!(normalize_search_query(" \n\t ").is_err());
    assert_eq!(normalize_search_query("  plan  ").unwrap(), "plan");
}

#[test]
fn normalize_document_identifier_rejects_empty() {
    assert!(matches!(
        normalize_document_identifier(" \n "),
        Err(CliError::EmptyDocumentId)
    ));
    assert_eq!(normalize_document_identifier("  abc123  ").unwrap(), "abc123");
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
}

#[test]
fn format_sync_timestamp_returns_utc_label() {
    assert_eq!(format_sync_timestamp(0), "1970-01-01 00:00:00 UTC");
}

#[test]
fn truncate_adds_ellipsis() {
    assert_eq!(
        truncate("This is a very long title that should be shortened", 20),
        "This is a very lo..."
    );
    assert_eq!(truncate("short", 20), "short");
}

#[test]
fn lifecycle_labels_are_distinct() {
    assert_eq!(lifecycle_label(Lifecycle::LocalOnly), "local");
    assert_eq!(lifecycle_label(Lifecycle::Stale), "modified");
    assert_eq!(lifecycle_label(Lifecycle::Loading { synced: true }), "loading");
}

#[test]
fn format_batch_report_lists_each_item() {
    let uploaded = DocumentId::new();
    let failed = DocumentId::new();
    let report = BatchReport {
        uploaded: vec![uploaded],
        failed: vec![(failed, "denied".to_string())],
        synced_at: 0,
    };

    let lines = format_batch_report(&report);
    assert_eq!(lines.len(), 3);
    assert!(lines[0].ends_with("uploaded"));
    assert!(lines[1].contains("failed: denied"));
    assert_eq!(lines[2], "1 of 2 uploaded at 1970-01-01 00:00:00 UTC");
}

#[test]
fn settings_view_redacts_secret() {
    let mut settings = cloudnote_core::models::SyncSettings::default();
    settings.set("secret_key", "SECRET123").unwrap();
    let rendered = SettingsView::new(&settings).lines().join("\n");
    assert!(!rendered.contains("SECRET123"));
    assert!(rendered.contains("sync_configured:     false"));
}

#[test]
fn config_set_rejects_unknown_key() {
    let dirs = test_dirs();
    let workspace = Workspace::open_path(&dirs.data).unwrap();
    assert!(matches!(
        run_config_set(&workspace, "colour", "blue"),
        Err(CliError::Core(cloudnote_core::Error::InvalidInput(_)))
    ));
    assert_eq!(
        workspace.stored_settings().unwrap().saved_file_location,
        Some(dirs.notes)
    );
}

#[tokio::test]
async fn config_check_requires_credentials() {
    let dirs = test_dirs();
    let workspace = Workspace::open_path(&dirs.data).unwrap();
    run_config_set(&workspace, "bucket_name", "notes").unwrap();

    assert!(matches!(
        run_config_check(&workspace).await,
        Err(CliError::Core(cloudnote_core::Error::SyncNotConfigured))
    ));
}

#[tokio::test]
async fn new_rename_delete_round_trip() {
    let dirs = test_dirs();

    let id = create_document("plan", Some("# Plan".to_string()), &dirs.data)
        .await
        .unwrap();
    assert_eq!(
        std::fs::read_to_string(dirs.notes.join("plan.md")).unwrap(),
        "# Plan"
    );

    let handle = open_host(&dirs.data).unwrap();
    let found = resolve_document("plan", &handle).await.unwrap();
    assert_eq!(found.id, id);
    let (body, download) = open_document(id, &handle).await.unwrap();
    assert_eq!(body, "# Plan");
    assert_eq!(download, None);
    drop(handle);

    run_rename(&id.to_string(), "roadmap", &dirs.data)
        .await
        .unwrap();
    assert!(!dirs.notes.join("plan.md").exists());
    assert!(dirs.notes.join("roadmap.md").exists());

    run_delete("roadmap", &dirs.data).await.unwrap();
    assert!(!dirs.notes.join("roadmap.md").exists());
    let handle = open_host(&dirs.data).unwrap();
    assert!(list_documents(&handle).await.unwrap().is_empty());
}

#[tokio::test]
async fn new_rejects_duplicate_title() {
    let dirs = test_dirs();
    create_document("plan", None, &dirs.data).await.unwrap();

    let err = create_document("plan", Some("other".to_string()), &dirs.data)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CliError::Core(cloudnote_core::Error::NameCollision(_))
    ));
    assert_eq!(
        std::fs::read_to_string(dirs.notes.join("plan.md")).unwrap(),
        "##"
    );
}

#[tokio::test]
async fn resolve_document_supports_exact_and_prefix_id() {
    let dirs = test_dirs();
    seed_rows(
        &dirs.data,
        &[
            "11111111-1111-7111-8111-111111111111",
            "11111111-1111-7111-8111-222222222222",
        ],
    );
    let handle = open_host(&dirs.data).unwrap();

    let exact = resolve_document("11111111-1111-7111-8111-111111111111", &handle)
        .await
        .unwrap();
    assert_eq!(exact.title, "doc-0");

    let prefixed = resolve_document("11111111-1111-7111-8111-2", &handle)
        .await
        .unwrap();
    assert_eq!(prefixed.title, "doc-1");

    assert!(matches!(
        resolve_document("11111111", &handle).await,
        Err(CliError::AmbiguousDocumentId(_))
    ));
    assert!(matches!(
        resolve_document("ffff", &handle).await,
        Err(CliError::DocumentNotFound(_))
    ));
}

#[tokio::test]
async fn import_skips_already_tracked_files() {
    let dirs = test_dirs();
    std::fs::create_dir_all(&dirs.notes).unwrap();
    let path = dirs.notes.join("Outside.md");
    std::fs::write(&path, "# Outside").unwrap();

    let first = run_import(&[path.clone()], &dirs.data).await.unwrap();
    assert_eq!(first.len(), 1);
    let second = run_import(&[path], &dirs.data).await.unwrap();
    assert!(second.is_empty());

    let handle = open_host(&dirs.data).unwrap();
    let documents = list_documents(&handle).await.unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].title, "Outside");
}

#[test]
fn import_rejects_non_markdown() {
    assert!(matches!(
        normalize_import_path(Path::new("notes.txt")),
        Err(CliError::NotMarkdown(_))
    ));
}

#[tokio::test]
async fn sync_requires_configuration() {
    let dirs = test_dirs();
    create_document("plan", None, &dirs.data).await.unwrap();

    assert!(matches!(
        run_sync_push("plan", &dirs.data).await,
        Err(CliError::Core(cloudnote_core::Error::SyncNotConfigured))
    ));
    assert!(matches!(
        run_sync_push_all(&dirs.data).await,
        Err(CliError::Core(cloudnote_core::Error::SyncNotConfigured))
    ));
}

#[test]
fn completions_write_to_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("completions").join("cloudnote.bash");

    run_completions(CompletionShell::Bash, Some(&output)).unwrap();
    let script = std::fs::read_to_string(output).unwrap();
    assert!(script.contains("cloudnote"));
}

#[test]
fn completions_cover_every_shell() {
    let bash = String::from_utf8(render_completions(CompletionShell::Bash)).unwrap();
    assert!(bash.contains("push-all"));

    let zsh = String::from_utf8(render_completions(CompletionShell::Zsh)).unwrap();
    assert!(zsh.starts_with("#compdef cloudnote"));

    let powershell = String::from_utf8(render_completions(CompletionShell::PowerShell)).unwrap();
    assert!(powershell.contains("Register-ArgumentCompleter"));
}
