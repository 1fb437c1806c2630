//! Remote object store seam.

use std::future::Future;
use std::path::Path;

use crate::{Error, Result};

/// Unit of the raw last-modified value a provider reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickUnit {
    /// S3 `LastModified`, already in epoch milliseconds once converted.
    Milliseconds,
    /// Qiniu-style `putTime`, in 100-nanosecond ticks since the epoch.
    HundredNanoseconds,
}

impl TickUnit {
    pub const fn ticks_per_millisecond(self) -> i64 {
        match self {
            Self::Milliseconds => 1,
            Self::HundredNanoseconds => 10_000,
        }
    }
}

/// Metadata returned by [`ObjectStore::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectStat {
    /// Raw provider timestamp, see `unit`.
    pub last_modified: i64,
    pub unit: TickUnit,
}

impl ObjectStat {
    pub const fn from_millis(millis: i64) -> Self {
        Self {
            last_modified: millis,
            unit: TickUnit::Milliseconds,
        }
    }

    /// Last-modified time in epoch milliseconds, rounded to nearest.
    pub const fn last_modified_millis(&self) -> i64 {
        let per = self.unit.ticks_per_millisecond();
        let quotient = self.last_modified.div_euclid(per);
        let remainder = self.last_modified.rem_euclid(per);
        if remainder * 2 >= per {
            quotient + 1
        } else {
            quotient
        }
    }
}

/// Opaque key/blob service documents are mirrored to.
///
/// `stat` and `get` report a missing object as
/// [`Error::RemoteNotFound`](crate::Error::RemoteNotFound); every other
/// failure is [`Error::RemoteTransfer`](crate::Error::RemoteTransfer).
pub trait ObjectStore: Send + Sync + 'static {
    /// Upload the file at `local_path` under `key`
    fn put(&self, key: &str, local_path: &Path) -> impl Future<Output = Result<()>> + Send;

    /// Download `key` into `local_path`, replacing its contents
    fn get(&self, key: &str, local_path: &Path) -> impl Future<Output = Result<()>> + Send;

    /// Fetch object metadata
    fn stat(&self, key: &str) -> impl Future<Output = Result<ObjectStat>> + Send;
}

/// An absent store behaves as unconfigured sync.
impl<T: ObjectStore> ObjectStore for Option<T> {
    async fn put(&self, key: &str, local_path: &Path) -> Result<()> {
        match self {
            Some(store) => store.put(key, local_path).await,
            None => Err(Error::SyncNotConfigured),
        }
    }

    async fn get(&self, key: &str, local_path: &Path) -> Result<()> {
        match self {
            Some(store) => store.get(key, local_path).await,
            None => Err(Error::SyncNotConfigured),
        }
    }

    async fn stat(&self, key: &str) -> Result<ObjectStat> {
        match self {
            Some(store) => store.stat(key).await,
            None => Err(Error::SyncNotConfigured),
        }
    }
}
