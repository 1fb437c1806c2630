use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "cloudnote")]
#[command(about = "Markdown notes on disk, mirrored to an S3-compatible bucket")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Directory holding settings.json and files-data.json
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new document
    #[command(alias = "add")]
    New {
        /// Document title (also its file name)
        title: String,
        /// Initial content; read from stdin or the editor when omitted
        content: Vec<String>,
    },
    /// List documents
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search document titles
    Search {
        /// Case-sensitive title fragment
        query: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a document's content
    Show {
        /// Document ID, unique ID prefix or exact title
        id: String,
    },
    /// Edit a document in $VISUAL / $EDITOR
    Edit {
        /// Document ID, unique ID prefix or exact title
        id: String,
    },
    /// Rename a document and its file
    Rename {
        /// Document ID, unique ID prefix or exact title
        id: String,
        /// New title
        title: String,
    },
    /// Delete a document and its file
    Delete {
        /// Document ID, unique ID prefix or exact title
        id: String,
    },
    /// Track existing Markdown files
    Import {
        /// Markdown files to import
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Transfer documents to or from the bucket
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Show or change sync settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Print a completion script for cloudnote's commands and flags
    Completions {
        /// Shell to generate the script for
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Write the script here instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Upload one document
    Push {
        /// Document ID, unique ID prefix or exact title
        id: String,
    },
    /// Download one document if the remote copy is newer
    Pull {
        /// Document ID, unique ID prefix or exact title
        id: String,
    },
    /// Upload every saved document
    PushAll,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective settings (secret redacted)
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check that the configured bucket is reachable
    Check,
    /// Update one setting
    Set {
        /// Setting name, e.g. bucket_name
        key: String,
        /// New value; empty clears it
        value: String,
    },
}
