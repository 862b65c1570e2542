//! Datadog monitor API model and client.
//!
//! - [`MonitorRequest`] and friends mirror the v1 monitor payload, with every
//!   optional setting as an `Option` that stays off the wire when unset.
//! - [`MonitorApi`] is the seam the reconciler talks to; [`DatadogClient`]
//!   implements it over HTTP and [`InMemoryMonitorApi`] in memory.

#![forbid(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod client;
pub mod config;
pub mod error;
pub mod memory;
pub mod types;

pub use client::{DatadogClient, MonitorApi};
pub use config::DatadogConfig;
pub use error::{Error, Result};
pub use memory::{ApiCall, InMemoryMonitorApi, Operation, MAX_RECORDED_CALLS};
pub use types::{
    LogSet, MonitorId, MonitorOptions, MonitorRequest, MonitorResponse, Period, QueryConfig,
    ThresholdValue, ThresholdWindows, Thresholds, TimeRange,
};
