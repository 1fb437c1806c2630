//! In-memory object store for tests and offline runs.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use super::remote::{ObjectStat, ObjectStore, TickUnit};
use crate::util::now_millis;
use crate::{Error, Result};

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    last_modified: i64,
}

#[derive(Debug, Default)]
struct Faults {
    failing: HashSet<String>,
    hanging: HashSet<String>,
    gated: HashMap<String, Arc<Notify>>,
}

/// [`ObjectStore`] keeping objects in a map.
///
/// Timestamps are reported in the configured [`TickUnit`]. Individual keys
/// can be made to fail, to never complete, or to wait for a gate.
#[derive(Debug)]
pub struct MemoryObjectStore {
    unit: TickUnit,
    objects: Mutex<HashMap<String, StoredObject>>,
    faults: Mutex<Faults>,
    calls: AtomicUsize,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::with_unit(TickUnit::Milliseconds)
    }

    pub fn with_unit(unit: TickUnit) -> Self {
        Self {
            unit,
            objects: Mutex::new(HashMap::new()),
            faults: Mutex::new(Faults::default()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Place an object with an explicit last-modified time in epoch ms.
    pub fn insert(&self, key: &str, bytes: impl Into<Vec<u8>>, last_modified_millis: i64) {
        let last_modified = last_modified_millis * self.unit.ticks_per_millisecond();
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert(
                key.to_string(),
                StoredObject {
                    bytes: bytes.into(),
                    last_modified,
                },
            );
        }
    }

    /// Contents of an object, if present.
    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .ok()?
            .get(key)
            .map(|object| object.bytes.clone())
    }

    /// Make every call touching `key` fail with a transfer error.
    pub fn fail_on(&self, key: &str) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.failing.insert(key.to_string());
        }
    }

    /// Make every call touching `key` never complete.
    pub fn hang_on(&self, key: &str) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.hanging.insert(key.to_string());
        }
    }

    /// Hold every call touching `key` until the returned gate is notified,
    /// one permit per call.
    pub fn gate_on(&self, key: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        if let Ok(mut faults) = self.faults.lock() {
            faults.gated.insert(key.to_string(), Arc::clone(&gate));
        }
        gate
    }

    /// Total number of `put`/`get`/`stat` calls received.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self, operation: &str, key: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (failing, hanging, gate) = self.faults.lock().map_or((false, false, None), |faults| {
            (
                faults.failing.contains(key),
                faults.hanging.contains(key),
                faults.gated.get(key).cloned(),
            )
        });
        if hanging {
            std::future::pending::<()>().await;
        }
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if failing {
            return Err(Error::RemoteTransfer(format!(
                "memory {operation} failed for {key}"
            )));
        }
        Ok(())
    }

    fn lookup(&self, key: &str) -> Result<StoredObject> {
        self.objects
            .lock()
            .map_err(|_| Error::RemoteTransfer("object map lock poisoned".to_string()))?
            .get(key)
            .cloned()
            .ok_or_else(|| Error::RemoteNotFound(key.to_string()))
    }
}

impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, local_path: &Path) -> Result<()> {
        self.enter("put", key).await?;
        let bytes = tokio::fs::read(local_path)
            .await
            .map_err(|error| Error::filesystem(local_path, error))?;
        self.insert(key, bytes, now_millis());
        Ok(())
    }

    async fn get(&self, key: &str, local_path: &Path) -> Result<()> {
        self.enter("get", key).await?;
        let object = self.lookup(key)?;
        tokio::fs::write(local_path, object.bytes)
            .await
            .map_err(|error| Error::filesystem(local_path, error))
    }

    async fn stat(&self, key: &str) -> Result<ObjectStat> {
        self.enter("stat", key).await?;
        let object = self.lookup(key)?;
        Ok(ObjectStat {
            last_modified: object.last_modified,
            unit: self.unit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_stat_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.md");
        std::fs::write(&source, "alpha").unwrap();
        let store = MemoryObjectStore::new();

        store.put("a.md", &source).await.unwrap();
        let stat = store.stat("a.md").await.unwrap();
        assert!(stat.last_modified_millis() > 0);

        let target = dir.path().join("b.md");
        store.get("a.md", &target).await.unwrap();
        assert_eq!(std::fs::read_to_string(target).unwrap(), "alpha");
        assert_eq!(store.call_count(), 3);
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let store = MemoryObjectStore::new();
        assert!(matches!(
            store.stat("nope.md").await,
            Err(Error::RemoteNotFound(_))
        ));
    }

    #[tokio::test]
    async fn reports_ticks_in_configured_unit() {
        let store = MemoryObjectStore::with_unit(TickUnit::HundredNanoseconds);
        store.insert("a.md", "x", 1_234);
        let stat = store.stat("a.md").await.unwrap();
        assert_eq!(stat.last_modified, 12_340_000);
        assert_eq!(stat.last_modified_millis(), 1_234);
    }

    #[tokio::test]
    async fn injected_failure_is_transfer_error() {
        let store = MemoryObjectStore::new();
        store.insert("a.md", "x", 1);
        store.fail_on("a.md");
        assert!(matches!(
            store.stat("a.md").await,
            Err(Error::RemoteTransfer(_))
        ));
    }

    #[tokio::test]
    async fn gated_call_waits_for_permit() {
        let store = Arc::new(MemoryObjectStore::new());
        store.insert("a.md", "x", 1);
        let gate = store.gate_on("a.md");

        let task = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.stat("a.md").await }
        });
        tokio::task::yield_now().await;
        assert!(!task.is_finished());

        gate.notify_one();
        assert_eq!(task.await.unwrap().unwrap().last_modified, 1);
    }
}
