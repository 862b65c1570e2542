//! The `Monitor` resource kept in sync with Datadog.
//!
//! - [`monitor`]: identity, desired spec and observed status.
//! - [`finalizer`]: the marker that gates physical removal on cleanup.
//! - [`translate`]: spec to Datadog request, keeping "unset" apart from zero.
//! - [`manifest`]: reading resources from YAML.

#![forbid(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod error;
pub mod finalizer;
pub mod manifest;
pub mod monitor;
pub mod translate;

pub use error::{Error, Result};
pub use finalizer::MONITOR_FINALIZER;
pub use manifest::parse_monitors;
pub use monitor::{
    monitor_url, LogSet, Monitor, MonitorSpec, MonitorStatus, ObjectKey, ObjectMeta, Options,
    Period, QueryConfig, Thresholds, TimeRange, API_VERSION, KIND,
};
