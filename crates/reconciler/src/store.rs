//! Declarative store seam and an in-memory implementation.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use itertools::Itertools;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

use ddmon_api::{Monitor, ObjectKey};

use crate::error::{Error, Result};

/// Change notification from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A resource was created, its spec changed, or deletion was requested.
    Applied(ObjectKey),
    /// A resource was erased.
    Deleted(ObjectKey),
}

impl StoreEvent {
    /// Key of the resource the event is about.
    pub const fn key(&self) -> &ObjectKey {
        match self {
            Self::Applied(key) | Self::Deleted(key) => key,
        }
    }
}

/// Trait for declarative store backends.
#[async_trait]
pub trait MonitorStore: Send + Sync {
    /// Fetch a resource; `None` if it does not exist.
    async fn get(&self, key: &ObjectKey) -> Result<Option<Monitor>>;

    /// Write a resource back.
    ///
    /// Fails with `Error::Conflict` if `metadata.resource_version` is stale.
    /// Returns the stored copy with its new version.
    async fn update(&self, monitor: &Monitor) -> Result<Monitor>;

    /// Keys of all resources.
    async fn list(&self) -> Result<Vec<ObjectKey>>;

    /// Subscribe to change notifications.
    fn watch(&self) -> broadcast::Receiver<StoreEvent>;
}

/// In-memory store with API-server write semantics.
///
/// Writes are version-checked, the deletion marker is set-once, and a
/// resource marked for deletion is erased as soon as its finalizer list is
/// empty. Writes that leave the spec untouched emit no event.
///
/// A store opened with [`InMemoryMonitorStore::open`] also keeps a JSON
/// snapshot on disk, rewritten on every change. A write the snapshot cannot
/// take is rolled back and fails with `StoreFailed`.
pub struct InMemoryMonitorStore {
    objects: RwLock<HashMap<ObjectKey, Monitor>>,
    events: broadcast::Sender<StoreEvent>,
    snapshot: Option<PathBuf>,
}

impl Default for InMemoryMonitorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMonitorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::with_objects(HashMap::new(), None)
    }

    /// Open a store backed by the snapshot at `path`, loading it if present.
    ///
    /// # Errors
    ///
    /// Returns `StoreFailed` if the snapshot exists but cannot be read or
    /// parsed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let objects = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let monitors: Vec<Monitor> = serde_json::from_slice(&bytes)
                    .map_err(|e| Error::store_failed("load", format!("{}: {e}", path.display())))?;
                monitors.into_iter().map(|m| (m.key(), m)).collect()
            }
            Err(e) if e.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(Error::store_failed(
                    "load",
                    format!("{}: {e}", path.display()),
                ));
            }
        };
        info!(path = %path.display(), count = objects.len(), "Opened monitor store");
        Ok(Self::with_objects(objects, Some(path)))
    }

    fn with_objects(objects: HashMap<ObjectKey, Monitor>, snapshot: Option<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            objects: RwLock::new(objects),
            events,
            snapshot,
        }
    }

    /// Create an empty store wrapped in an Arc.
    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Add a new resource.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the key is taken.
    pub async fn create(&self, monitor: Monitor) -> Result<Monitor> {
        let key = monitor.key();
        let mut objects = self.objects.write().await;
        if objects.contains_key(&key) {
            return Err(Error::already_exists(&key));
        }

        let mut stored = monitor;
        stored.metadata.resource_version = 1;
        stored.metadata.generation = 1;
        stored.metadata.deletion_timestamp = None;
        self.commit(&mut objects, &key, Some(stored.clone())).await?;
        drop(objects);

        debug!(key = %key, "Created monitor resource");
        self.emit(StoreEvent::Applied(key));
        Ok(stored)
    }

    /// Create the resource, or replace the spec and labels of an existing one.
    ///
    /// The read and the write happen under one lock, so concurrent status
    /// writes cannot make it conflict.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the write.
    pub async fn apply(&self, monitor: Monitor) -> Result<Monitor> {
        let key = monitor.key();
        let mut objects = self.objects.write().await;
        let Some(current) = objects.get(&key) else {
            drop(objects);
            return self.create(monitor).await;
        };

        let mut desired = current.clone();
        desired.spec = monitor.spec;
        desired.metadata.labels = monitor.metadata.labels;
        let (stored, event) = self.write(&mut objects, &desired).await?;
        drop(objects);

        if let Some(event) = event {
            self.emit(event);
        }
        Ok(stored)
    }

    /// Request deletion of a resource.
    ///
    /// Erases it at once if no finalizer is present, otherwise sets the
    /// deletion marker (only the first request sets it).
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the key does not exist.
    pub async fn delete(&self, key: &ObjectKey) -> Result<()> {
        let mut objects = self.objects.write().await;
        let Some(current) = objects.get(key) else {
            return Err(Error::not_found(key));
        };

        if current.metadata.finalizers.is_empty() {
            self.commit(&mut objects, key, None).await?;
            drop(objects);
            debug!(key = %key, "Erased monitor resource");
            self.emit(StoreEvent::Deleted(key.clone()));
            return Ok(());
        }

        if current.metadata.deletion_timestamp.is_none() {
            let mut marked = current.clone();
            marked.metadata.deletion_timestamp = Some(Utc::now());
            marked.metadata.resource_version = marked.metadata.resource_version.saturating_add(1);
            self.commit(&mut objects, key, Some(marked)).await?;
            drop(objects);
            debug!(key = %key, "Marked monitor resource for deletion");
            self.emit(StoreEvent::Applied(key.clone()));
        }
        Ok(())
    }

    /// Check if the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// Version-checked write of `monitor`, returning the stored copy and the
    /// event to emit once the lock is released.
    async fn write(
        &self,
        objects: &mut HashMap<ObjectKey, Monitor>,
        monitor: &Monitor,
    ) -> Result<(Monitor, Option<StoreEvent>)> {
        let key = monitor.key();
        let Some(current) = objects.get(&key) else {
            return Err(Error::not_found(&key));
        };

        let expected = monitor.metadata.resource_version;
        let actual = current.metadata.resource_version;
        if expected != actual {
            return Err(Error::conflict(&key, expected, actual));
        }

        let spec_changed = current.spec != monitor.spec;
        let mut stored = monitor.clone();
        stored.metadata.resource_version = actual.saturating_add(1);
        stored.metadata.generation = if spec_changed {
            current.metadata.generation.saturating_add(1)
        } else {
            current.metadata.generation
        };
        // The deletion marker belongs to the store.
        stored.metadata.deletion_timestamp = current.metadata.deletion_timestamp;

        if stored.is_being_deleted() && stored.metadata.finalizers.is_empty() {
            self.commit(objects, &key, None).await?;
            debug!(key = %key, "Finalizers cleared, erased monitor resource");
            return Ok((stored, Some(StoreEvent::Deleted(key))));
        }

        self.commit(objects, &key, Some(stored.clone())).await?;
        let event = spec_changed.then_some(StoreEvent::Applied(key));
        Ok((stored, event))
    }

    /// Put `value` at `key` (or remove it when `None`) and write the snapshot.
    /// The map is restored if the snapshot write fails.
    async fn commit(
        &self,
        objects: &mut HashMap<ObjectKey, Monitor>,
        key: &ObjectKey,
        value: Option<Monitor>,
    ) -> Result<()> {
        let previous = match value {
            Some(monitor) => objects.insert(key.clone(), monitor),
            None => objects.remove(key),
        };
        let Some(path) = &self.snapshot else {
            return Ok(());
        };

        if let Err(e) = write_snapshot(path, objects).await {
            match previous {
                Some(monitor) => objects.insert(key.clone(), monitor),
                None => objects.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl MonitorStore for InMemoryMonitorStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<Monitor>> {
        Ok(self.objects.read().await.get(key).cloned())
    }

    async fn update(&self, monitor: &Monitor) -> Result<Monitor> {
        let mut objects = self.objects.write().await;
        let (stored, event) = self.write(&mut objects, monitor).await?;
        drop(objects);

        if let Some(event) = event {
            self.emit(event);
        }
        Ok(stored)
    }

    async fn list(&self) -> Result<Vec<ObjectKey>> {
        Ok(self.objects.read().await.keys().cloned().sorted().collect_vec())
    }

    fn watch(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

/// Write all resources to `path`, sorted by key, through a temporary file.
async fn write_snapshot(path: &Path, objects: &HashMap<ObjectKey, Monitor>) -> Result<()> {
    let monitors = objects
        .iter()
        .sorted_by(|a, b| a.0.cmp(b.0))
        .map(|(_, monitor)| monitor)
        .collect_vec();
    let bytes = serde_json::to_vec_pretty(&monitors)
        .map_err(|e| Error::store_failed("persist", e.to_string()))?;

    let staging = path.with_extension("tmp");
    tokio::fs::write(&staging, bytes)
        .await
        .map_err(|e| Error::store_failed("persist", format!("{}: {e}", staging.display())))?;
    tokio::fs::rename(&staging, path)
        .await
        .map_err(|e| Error::store_failed("persist", format!("{}: {e}", path.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddmon_api::{MonitorSpec, MONITOR_FINALIZER};

    fn monitor(name: &str) -> Monitor {
        Monitor::new("default", name, MonitorSpec::new(name, "metric alert", "q"))
    }

    #[tokio::test]
    async fn test_update_bumps_version() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let store = InMemoryMonitorStore::new();
        let created = store.create(monitor("cpu")).await?;
        assert_eq!(created.metadata.resource_version, 1);

        let updated = store.update(&created).await?;
        assert_eq!(updated.metadata.resource_version, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_stale_write_conflicts() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let store = InMemoryMonitorStore::new();
        let created = store.create(monitor("cpu")).await?;
        store.update(&created).await?;

        let result = store.update(&created).await;
        assert!(result.is_err_and(|e| e.is_conflict()));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_twice_fails() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let store = InMemoryMonitorStore::new();
        store.create(monitor("cpu")).await?;
        assert!(matches!(
            store.create(monitor("cpu")).await,
            Err(Error::AlreadyExists { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_without_finalizer_erases() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let store = InMemoryMonitorStore::new();
        let created = store.create(monitor("cpu")).await?;

        store.delete(&created.key()).await?;
        assert!(store.get(&created.key()).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_with_finalizer_marks_once() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let store = InMemoryMonitorStore::new();
        let mut created = store.create(monitor("cpu")).await?;
        created.add_finalizer();
        store.update(&created).await?;

        store.delete(&created.key()).await?;
        let first = store.get(&created.key()).await?.ok_or("missing")?;
        let marker = first.metadata.deletion_timestamp.ok_or("not marked")?;

        store.delete(&created.key()).await?;
        let second = store.get(&created.key()).await?.ok_or("missing")?;
        assert_eq!(second.metadata.deletion_timestamp, Some(marker));
        assert!(second.has_finalizer(MONITOR_FINALIZER));
        Ok(())
    }

    #[tokio::test]
    async fn test_clearing_finalizers_erases_marked_resource() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let store = InMemoryMonitorStore::new();
        let mut created = store.create(monitor("cpu")).await?;
        created.add_finalizer();
        store.update(&created).await?;
        store.delete(&created.key()).await?;

        let mut marked = store.get(&created.key()).await?.ok_or("missing")?;
        marked.remove_finalizer();
        store.update(&marked).await?;

        assert!(store.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn test_client_cannot_clear_deletion_marker() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let store = InMemoryMonitorStore::new();
        let mut created = store.create(monitor("cpu")).await?;
        created.add_finalizer();
        store.update(&created).await?;
        store.delete(&created.key()).await?;

        let mut marked = store.get(&created.key()).await?.ok_or("missing")?;
        marked.metadata.deletion_timestamp = None;
        let stored = store.update(&marked).await?;
        assert!(stored.is_being_deleted());
        Ok(())
    }

    #[tokio::test]
    async fn test_status_only_write_is_silent() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let store = InMemoryMonitorStore::new();
        let mut events = store.watch();
        let mut created = store.create(monitor("cpu")).await?;
        assert_eq!(events.recv().await?, StoreEvent::Applied(created.key()));

        created.status.error = Some("boom".to_string());
        let mut stored = store.update(&created).await?;
        assert!(events.try_recv().is_err());

        stored.spec.query = "avg(last_1m):system.cpu>90".to_string();
        let stored = store.update(&stored).await?;
        assert_eq!(stored.metadata.generation, 2);
        assert_eq!(events.recv().await?, StoreEvent::Applied(created.key()));
        Ok(())
    }

    #[tokio::test]
    async fn test_apply_keeps_store_owned_fields() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let store = InMemoryMonitorStore::new();
        let mut created = store.create(monitor("cpu")).await?;
        created.add_finalizer();
        store.update(&created).await?;

        // A manifest carries no version, finalizers or status.
        let mut edited = monitor("cpu");
        edited.spec.query = "avg(last_1m):system.cpu>90".to_string();
        let stored = store.apply(edited).await?;

        assert_eq!(stored.metadata.resource_version, 3);
        assert_eq!(stored.metadata.generation, 2);
        assert!(stored.has_finalizer(MONITOR_FINALIZER));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_is_sorted() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let store = InMemoryMonitorStore::new();
        store.create(monitor("b")).await?;
        store.create(monitor("a")).await?;

        let keys = store.list().await?;
        assert_eq!(
            keys,
            vec![ObjectKey::new("default", "a"), ObjectKey::new("default", "b")]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_snapshot_survives_reopen() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("state.json");

        let store = InMemoryMonitorStore::open(&path).await?;
        let mut created = store.create(monitor("cpu")).await?;
        created.add_finalizer();
        created.status = ddmon_api::MonitorStatus::created(42, Utc::now());
        store.update(&created).await?;
        store.create(monitor("disk")).await?;
        store.delete(&ObjectKey::new("default", "disk")).await?;
        drop(store);

        let reopened = InMemoryMonitorStore::open(&path).await?;
        assert_eq!(reopened.list().await?, vec![ObjectKey::new("default", "cpu")]);
        let stored = reopened.get(&created.key()).await?.ok_or("missing")?;
        assert_eq!(stored.status.id, Some(42));
        assert_eq!(stored.metadata.resource_version, 2);
        assert!(stored.has_finalizer(MONITOR_FINALIZER));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_snapshot_opens_empty() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = InMemoryMonitorStore::open(dir.path().join("absent.json")).await?;
        assert!(store.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_rejected() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json")?;

        let result = InMemoryMonitorStore::open(&path).await;
        assert!(matches!(result, Err(Error::StoreFailed { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_unwritable_snapshot_rolls_back() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("state.json");
        let store = InMemoryMonitorStore::open(&path).await?;
        let created = store.create(monitor("cpu")).await?;

        // A directory where the staging file goes makes every write fail.
        std::fs::create_dir(path.with_extension("tmp"))?;
        let mut changed = created.clone();
        changed.spec.query = "avg(last_1m):system.cpu>90".to_string();
        let result = store.update(&changed).await;

        assert!(matches!(result, Err(Error::StoreFailed { .. })));
        let stored = store.get(&created.key()).await?.ok_or("missing")?;
        assert_eq!(stored, created);
        assert!(store.create(monitor("disk")).await.is_err());
        assert_eq!(store.list().await?, vec![created.key()]);
        Ok(())
    }
}
