pub mod common;
pub mod completions;
pub mod config;
pub mod delete;
pub mod edit;
pub mod import;
pub mod list;
pub mod new;
pub mod rename;
pub mod search;
pub mod show;
pub mod sync;
