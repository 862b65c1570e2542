//! Level-triggered reconciliation of `Monitor` resources against Datadog.
//!
//! Every pass reads the stored resource and derives one step from it:
//!
//! - **Finalize**: deletion requested, delete the Datadog monitor and release
//!   the resource
//! - **Attach finalizer**: first sight, claim the resource
//! - **Create**: not yet in Datadog
//! - **Update**: already in Datadog, re-submit the full definition
//!
//! The [`ReconciliationLoop`] feeds keys from the store's watch stream and
//! from requeue directives through a [`WorkQueue`], so each key has at most
//! one reconcile in flight.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ddmon_datadog::InMemoryMonitorApi;
//! use ddmon_reconciler::{
//!     InMemoryMonitorStore, LoopConfig, ReconcilerBuilder, ReconciliationLoop,
//! };
//!
//! #[tokio::main]
//! async fn main() -> ddmon_reconciler::Result<()> {
//!     let store = InMemoryMonitorStore::new_arc();
//!     let reconciler = ReconcilerBuilder::new()
//!         .with_store(store.clone())
//!         .with_api(Arc::new(InMemoryMonitorApi::new()))
//!         .build()?;
//!
//!     let mut loop_runner =
//!         ReconciliationLoop::new(Arc::new(reconciler), store, LoopConfig::default());
//!     loop_runner.run().await
//! }
//! ```

#![forbid(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod error;
pub mod r#loop;
pub mod queue;
pub mod reconciler;
pub mod store;
pub mod types;

pub use error::{Error, Result};
pub use queue::{deadline_after, WorkQueue, MAX_DELAY};
pub use r#loop::{LoopConfig, LoopStopper, ReconciliationLoop};
pub use reconciler::{Reconciler, ReconcilerBuilder, ReconcilerConfig, DEFAULT_REQUEUE_INTERVAL};
pub use store::{InMemoryMonitorStore, MonitorStore, StoreEvent};
pub use types::{Phase, Requeue};
