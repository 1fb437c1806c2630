//! cloudnote-core - Core library for CloudNote
//!
//! This crate contains the document registry, metadata persistence, the
//! credential gate and the sync orchestrator used by CloudNote clients.

pub mod error;
pub mod models;
pub mod persist;
pub mod registry;
pub mod services;
pub mod state;
pub mod storage;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{DocumentId, DocumentRecord};
