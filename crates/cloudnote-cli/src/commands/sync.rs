use std::path::Path;

use cloudnote_core::services::{Request, Response};
use cloudnote_core::sync::{BatchReport, DownloadStatus};

use crate::commands::common::{
    format_sync_timestamp, normalize_document_identifier, open_host, resolve_document, short_id,
    unexpected,
};
use crate::error::CliError;

pub async fn run_sync_push(id: &str, data_dir: &Path) -> Result<(), CliError> {
    let normalized_id = normalize_document_identifier(id)?;
    let handle = open_host(data_dir)?;
    let document = resolve_document(&normalized_id, &handle).await?;

    handle.request(Request::UploadOne(document.id)).await?;
    println!("Uploaded {}", document.title);
    Ok(())
}

pub async fn run_sync_pull(id: &str, data_dir: &Path) -> Result<DownloadStatus, CliError> {
    let normalized_id = normalize_document_identifier(id)?;
    let handle = open_host(data_dir)?;
    let document = resolve_document(&normalized_id, &handle).await?;

    let status = match handle.request(Request::DownloadOne(document.id)).await? {
        Response::Downloaded { status, .. } => status,
        other => return Err(unexpected("Downloaded", &other)),
    };
    println!("{}", status.as_str());
    Ok(status)
}

pub async fn run_sync_push_all(data_dir: &Path) -> Result<(), CliError> {
    let handle = open_host(data_dir)?;
    let report = match handle.request(Request::UploadAll).await? {
        Response::BatchUploaded(report) => report,
        other => return Err(unexpected("BatchUploaded", &other)),
    };

    for line in format_batch_report(&report) {
        println!("{line}");
    }
    report.into_result()?;
    Ok(())
}

pub fn format_batch_report(report: &BatchReport) -> Vec<String> {
    let mut lines = Vec::with_capacity(report.total() + 1);
    lines.extend(report.uploaded.iter().map(|id| format!("{}  uploaded", short_id(*id))));
    lines.extend(
        report
            .failed
            .iter()
            .map(|(id, message)| format!("{}  failed: {message}", short_id(*id))),
    );
    lines.push(format!(
        "{} of {} uploaded at {}",
        report.uploaded.len(),
        report.total(),
        format_sync_timestamp(report.synced_at)
    ));
    lines
}
