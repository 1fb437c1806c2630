//! Services composing the registry, persistence and sync layers.

mod host;
mod session;
mod workspace;

pub use host::{
    DocumentSummary, HostHandle, PendingRequest, Request, RequestId, Response, SessionHost,
};
pub use session::{BatchJob, DownloadJob, OpenPlan, Session, SessionEvent, UploadJob};
pub use workspace::{LocalSession, Workspace};
