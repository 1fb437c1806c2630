//! CloudNote CLI - Markdown notes from the command line
//!
//! Documents live as Markdown files on disk and can be mirrored to an
//! S3-compatible bucket.

mod cli;
mod commands;
mod error;
#[cfg(test)]
mod tests;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, SyncCommands};
use crate::commands::common::resolve_data_dir;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::import::run_import;
use crate::commands::list::run_list;
use crate::commands::new::run_new;
use crate::commands::rename::run_rename;
use crate::commands::search::run_search;
use crate::commands::show::run_show;
use crate::commands::sync::{run_sync_pull, run_sync_push, run_sync_push_all};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cloudnote=warn,cloudnote_core=warn")),
        )
        .init();

    let cli = Cli::parse();
    let data_dir = resolve_data_dir(cli.data_dir);

    match cli.command {
        Some(Commands::New { title, content }) => {
            run_new(&title, &content, &data_dir).await?;
        }
        Some(Commands::List { json }) => run_list(json, &data_dir).await?,
        Some(Commands::Search { query, json }) => run_search(&query, json, &data_dir).await?,
        Some(Commands::Show { id }) => run_show(&id, &data_dir).await?,
        Some(Commands::Edit { id }) => run_edit(&id, &data_dir).await?,
        Some(Commands::Rename { id, title }) => run_rename(&id, &title, &data_dir).await?,
        Some(Commands::Delete { id }) => run_delete(&id, &data_dir).await?,
        Some(Commands::Import { paths }) => {
            run_import(&paths, &data_dir).await?;
        }
        Some(Commands::Sync { command }) => match command {
            SyncCommands::Push { id } => run_sync_push(&id, &data_dir).await?,
            SyncCommands::Pull { id } => {
                run_sync_pull(&id, &data_dir).await?;
            }
            SyncCommands::PushAll => run_sync_push_all(&data_dir).await?,
        },
        Some(Commands::Config { command }) => run_config(command, &data_dir).await?,
        Some(Commands::Completions { shell, output }) => {
            run_completions(shell, output.as_deref())?;
        }
        None => {
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
