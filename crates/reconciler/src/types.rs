//! Core types for the reconciler.

use std::fmt;
use std::time::Duration;

use ddmon_api::{Monitor, MONITOR_FINALIZER};

/// What the dispatcher should do with a key after a reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    /// Nothing left to do until the next event.
    Never,
    /// Reconcile again right away.
    Immediately,
    /// Reconcile again after the delay.
    After(Duration),
}

impl Requeue {
    /// Delay before the next reconcile, if any.
    pub const fn delay(self) -> Option<Duration> {
        match self {
            Self::Never => None,
            Self::Immediately => Some(Duration::ZERO),
            Self::After(delay) => Some(delay),
        }
    }
}

/// Step a reconcile takes, derived from the stored resource alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Deletion requested: clean up Datadog, then release the resource.
    Finalize,
    /// First sight of the resource: attach the finalizer.
    AttachFinalizer,
    /// Not yet in Datadog: create it.
    Create,
    /// Already in Datadog: re-submit the full definition.
    Update,
}

impl Phase {
    /// Derive the phase from the current state of the resource.
    pub fn of(monitor: &Monitor) -> Self {
        if monitor.is_being_deleted() {
            Self::Finalize
        } else if !monitor.has_finalizer(MONITOR_FINALIZER) {
            Self::AttachFinalizer
        } else if monitor.is_submitted() {
            Self::Update
        } else {
            Self::Create
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Finalize => "finalize",
            Self::AttachFinalizer => "attach-finalizer",
            Self::Create => "create",
            Self::Update => "update",
        };
        f.write_str(name)
    }
}
