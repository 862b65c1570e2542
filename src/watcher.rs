//! Change notifications for the manifest directory.
//!
//! Bursts of file events are debounced and collapsed into a single `()` on
//! the returned channel; the receiver re-reads the whole directory anyway.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{DebounceEventResult, DebouncedEvent, Debouncer, new_debouncer};
use tokio::sync::mpsc;
use tracing::warn;

/// Quiet period before a burst of edits is reported.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Keeps the directory watched until dropped.
pub struct ManifestWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
}

/// Watch `dir` for added, changed or removed manifests.
///
/// # Errors
///
/// Returns an error if the watcher cannot be created or `dir` cannot be
/// watched.
pub fn watch_dir(
    dir: &Path,
    debounce: Duration,
) -> Result<(ManifestWatcher, mpsc::Receiver<()>)> {
    // One pending notification is enough to trigger a full re-sync.
    let (tx, rx) = mpsc::channel(1);

    let mut debouncer = new_debouncer(debounce, move |res: DebounceEventResult| match res {
        Ok(events) => {
            if events.iter().any(is_manifest) {
                let _ = tx.try_send(());
            }
        }
        Err(e) => warn!(error = ?e, "Manifest watcher error"),
    })
    .context("Failed to create manifest watcher")?;

    debouncer
        .watcher()
        .watch(dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch {}", dir.display()))?;

    Ok((
        ManifestWatcher {
            _debouncer: debouncer,
        },
        rx,
    ))
}

fn is_manifest(event: &DebouncedEvent) -> bool {
    event
        .path
        .extension()
        .is_some_and(|ext| ext == "yaml" || ext == "yml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_manifest_write_is_reported() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let (_watcher, mut changes) = watch_dir(dir.path(), Duration::from_millis(50))?;

        std::fs::write(dir.path().join("cpu.yaml"), "kind: Monitor\n")?;

        let changed = tokio::time::timeout(Duration::from_secs(5), changes.recv()).await?;
        assert_eq!(changed, Some(()));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_other_files_are_ignored() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let (_watcher, mut changes) = watch_dir(dir.path(), Duration::from_millis(50))?;

        std::fs::write(dir.path().join("README.md"), "notes")?;

        let changed = tokio::time::timeout(Duration::from_millis(500), changes.recv()).await;
        assert!(changed.is_err());
        Ok(())
    }

    #[test]
    fn test_missing_dir_is_reported() {
        let result = watch_dir(Path::new("/nonexistent/monitors"), DEFAULT_DEBOUNCE);
        assert!(result.is_err());
    }
}
