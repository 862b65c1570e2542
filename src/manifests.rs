//! Keeping the store in line with the Monitor manifests on disk.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use itertools::Itertools;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use ddmon_api::{Monitor, ObjectKey, parse_monitors};
use ddmon_reconciler::{InMemoryMonitorStore, MonitorStore};

/// Manifest files in `dir`, sorted by name.
///
/// # Errors
///
/// Returns an error if the directory cannot be listed.
pub fn manifest_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read manifest directory {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_yaml = path
            .extension()
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        if path.is_file() && is_yaml {
            files.push(path);
        }
    }
    Ok(files.into_iter().sorted().collect_vec())
}

/// Parse every Monitor found in `dir`.
///
/// # Errors
///
/// Returns an error naming the first file that cannot be read or parsed.
pub fn load_dir(dir: &Path) -> Result<Vec<Monitor>> {
    let mut monitors = Vec::new();
    for file in manifest_files(dir)? {
        let content = std::fs::read_to_string(&file)
            .with_context(|| format!("Failed to read manifest {}", file.display()))?;
        let parsed = parse_monitors(&content)
            .with_context(|| format!("Invalid manifest {}", file.display()))?;
        debug!(file = %file.display(), count = parsed.len(), "Parsed manifest");
        monitors.extend(parsed);
    }
    Ok(monitors)
}

/// What a [`sync`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Resources created or given a new spec.
    pub applied: usize,
    /// Resources whose manifest is gone and whose deletion was requested.
    pub deleted: usize,
}

/// Make `store` match `dir`: apply every manifest, and request deletion of
/// stored resources no manifest names any more. A later manifest for the
/// same key replaces the earlier spec.
///
/// The whole directory is parsed first, so a broken manifest changes nothing.
///
/// # Errors
///
/// Returns an error if loading fails or the store rejects a write.
pub async fn sync(store: &InMemoryMonitorStore, dir: &Path) -> Result<SyncReport> {
    let monitors = load_dir(dir)?;
    let wanted: HashSet<ObjectKey> = monitors.iter().map(Monitor::key).collect();

    let mut report = SyncReport::default();
    for monitor in monitors {
        let key = monitor.key();
        let before = store.get(&key).await?;
        let stored = store
            .apply(monitor)
            .await
            .with_context(|| format!("Failed to store monitor {key}"))?;
        if before.is_none_or(|b| b.metadata.generation != stored.metadata.generation) {
            report.applied = report.applied.saturating_add(1);
        }
    }

    for key in store.list().await? {
        if wanted.contains(&key) {
            continue;
        }
        let marked = store.get(&key).await?.is_some_and(|m| m.is_being_deleted());
        if marked {
            continue;
        }
        info!(key = %key, "Manifest removed, deleting monitor");
        store
            .delete(&key)
            .await
            .with_context(|| format!("Failed to delete monitor {key}"))?;
        report.deleted = report.deleted.saturating_add(1);
    }

    info!(
        dir = %dir.display(),
        applied = report.applied,
        deleted = report.deleted,
        "Synced monitor manifests"
    );
    Ok(report)
}

/// Re-sync `dir` into `store` on every change notification until the
/// sender goes away. A failed sync is logged and the store is left as it was.
pub async fn follow(
    store: Arc<InMemoryMonitorStore>,
    dir: PathBuf,
    mut changes: mpsc::Receiver<()>,
) {
    while changes.recv().await.is_some() {
        debug!(dir = %dir.display(), "Manifest directory changed");
        if let Err(e) = sync(&store, &dir).await {
            warn!(
                error = %format!("{e:#}"),
                "Manifest sync failed, keeping current monitors"
            );
        }
    }
    debug!("Manifest watcher closed");
}
