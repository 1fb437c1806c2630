//! Data models for cloudnote

mod document;
mod settings;

pub use document::{
    object_key_for, DocumentId, DocumentMeta, DocumentRecord, Lifecycle, DRAFT_PLACEHOLDER,
    MARKDOWN_EXTENSION,
};
pub use settings::{SyncSettings, SETTING_NAMES};
