//! Storage seams: local Markdown files and the remote object store.

mod local;
mod memory;
mod remote;
mod s3;

pub use local::{LocalFiles, TokioFiles};
pub use memory::MemoryObjectStore;
pub use remote::{ObjectStat, ObjectStore, TickUnit};
pub use s3::{S3Config, S3ObjectStore};
