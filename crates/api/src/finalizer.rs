//! Finalizer bookkeeping on a `Monitor`.
//!
//! The operator's marker stays on the resource from the first reconcile until
//! the Datadog monitor is gone; the store refuses to erase a resource while
//! any marker remains.

use crate::monitor::Monitor;

/// Marker owned by this operator.
pub const MONITOR_FINALIZER: &str = "monitor.datadog.finalizer.skang0601.github.io";

impl Monitor {
    /// Check whether the marker `name` is present.
    pub fn has_finalizer(&self, name: &str) -> bool {
        self.metadata.finalizers.iter().any(|f| f == name)
    }

    /// Attach the operator's marker unless it is already there.
    pub fn add_finalizer(&mut self) {
        if !self.has_finalizer(MONITOR_FINALIZER) {
            self.metadata.finalizers.push(MONITOR_FINALIZER.to_string());
        }
    }

    /// Drop every occurrence of the operator's marker.
    pub fn remove_finalizer(&mut self) {
        self.metadata.finalizers.retain(|f| f != MONITOR_FINALIZER);
    }
}
