#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # ddmon
//!
//! Operator that keeps Datadog monitors in sync with declarative `Monitor`
//! resources.
//!
//! The binary wires the pieces together; this library holds the parts of it
//! worth testing on their own.

pub mod cli;
pub mod config;
pub mod manifests;
pub mod watcher;

pub use ddmon_api as api;
pub use ddmon_datadog as datadog;
pub use ddmon_reconciler as reconciler;
