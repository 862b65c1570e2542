//! The `Monitor` resource: identity, desired spec and observed status.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ddmon_datadog::MonitorId;

/// API group/version of the Monitor resource.
pub const API_VERSION: &str = "datadog.github.com/v1alpha1";

/// Kind of the Monitor resource.
pub const KIND: &str = "Monitor";

/// Link to a monitor in the Datadog UI.
pub fn monitor_url(id: MonitorId) -> String {
    format!("https://app.datadoghq.com/monitors/{id}")
}

/// Namespace/name identity of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    /// Create a key.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Store-owned metadata of a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Optimistic-concurrency token; bumped by the store on every write.
    #[serde(default)]
    pub resource_version: u64,
    /// Bumped by the store whenever the spec changes.
    #[serde(default)]
    pub generation: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,
    /// Set once by the store when deletion is requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

fn default_namespace() -> String {
    "default".to_string()
}

/// Desired state of a Datadog monitor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub monitor_type: String,
    pub query: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default)]
    pub options: Options,
    /// Tags to attach to the monitor; order carries no meaning.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Monitor options. `None` means "leave to Datadog's default".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    #[serde(rename = "no_data_time_frame", default, skip_serializing_if = "Option::is_none")]
    pub no_data_timeframe: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_audit: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_no_data: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renotify_interval: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_host_delay: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_delay: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub silenced: Option<BTreeMap<String, i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_h: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_message: Option<String>,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_tags: Option<bool>,
    #[serde(
        alias = "requre_full_window",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub require_full_window: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_logs_sample: Option<bool>,
    #[serde(default)]
    pub query_config: QueryConfig,
}

/// Thresholds as decimal strings; an empty string means unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub ok: String,
    pub critical: String,
    pub warning: String,
    pub unknown: String,
    pub critical_recovery: String,
    pub warning_recovery: String,
    pub period: Period,
    #[serde(rename = "timeAggregator")]
    pub time_aggregator: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Period {
    pub seconds: i32,
    pub text: String,
    pub value: String,
    pub name: String,
    pub unit: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    #[serde(rename = "logset")]
    pub log_set: LogSet,
    #[serde(rename = "timeRange")]
    pub time_range: TimeRange,
    #[serde(rename = "queryString")]
    pub query_string: String,
    #[serde(rename = "queryIsFailed")]
    pub query_is_failed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSet {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeRange {
    pub to: i32,
    pub from: i32,
    pub live: bool,
}

/// Observed state of the Datadog monitor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStatus {
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MonitorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Last failure message; cleared on the next success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl MonitorStatus {
    /// Status of a monitor Datadog just created.
    pub fn created(id: MonitorId, at: DateTime<Utc>) -> Self {
        Self {
            active: true,
            id: Some(id),
            url: Some(monitor_url(id)),
            error: None,
            last_updated: None,
            created: Some(at),
        }
    }
}

/// A Monitor resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Monitor {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: MonitorSpec,
    #[serde(default)]
    pub status: MonitorStatus,
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn default_kind() -> String {
    KIND.to_string()
}

impl Monitor {
    /// Create a monitor in `namespace/name` with an empty status.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, spec: MonitorSpec) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata: ObjectMeta {
                name: name.into(),
                namespace: namespace.into(),
                ..ObjectMeta::default()
            },
            spec,
            status: MonitorStatus::default(),
        }
    }

    /// Store key of this monitor.
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.metadata.namespace, &self.metadata.name)
    }

    /// Whether Datadog already holds this monitor.
    pub fn is_submitted(&self) -> bool {
        self.status.active && self.status.url.as_deref().is_some_and(|url| !url.is_empty())
    }

    /// Whether the store has been asked to delete this monitor.
    pub const fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }
}

impl MonitorSpec {
    /// Create a spec with the required fields.
    pub fn new(
        name: impl Into<String>,
        monitor_type: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            monitor_type: monitor_type.into(),
            query: query.into(),
            ..Self::default()
        }
    }

    /// Set the notification message.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add a tag.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Replace the options block.
    #[must_use]
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submitted_needs_active_and_url() {
        let mut monitor = Monitor::new("default", "cpu", MonitorSpec::default());
        assert!(!monitor.is_submitted());

        monitor.status.active = true;
        assert!(!monitor.is_submitted());

        monitor.status.url = Some(String::new());
        assert!(!monitor.is_submitted());

        monitor.status = MonitorStatus::created(7, Utc::now());
        assert!(monitor.is_submitted());
    }

    #[test]
    fn test_created_status_url() {
        let status = MonitorStatus::created(12345, Utc::now());
        assert_eq!(
            status.url.as_deref(),
            Some("https://app.datadoghq.com/monitors/12345")
        );
        assert_eq!(status.id, Some(12345));
        assert!(status.active);
    }

    #[test]
    fn test_key_display() {
        let monitor = Monitor::new("prod", "cpu-high", MonitorSpec::default());
        assert_eq!(monitor.key().to_string(), "prod/cpu-high");
    }

    #[test]
    fn test_legacy_full_window_spelling() -> Result<(), Box<dyn std::error::Error>> {
        let options: Options = serde_yaml::from_str("requre_full_window: true\n")?;
        assert_eq!(options.require_full_window, Some(true));
        Ok(())
    }

    #[test]
    fn test_status_serializes_snake_case() -> Result<(), Box<dyn std::error::Error>> {
        let status = MonitorStatus {
            last_updated: Some(Utc::now()),
            ..MonitorStatus::default()
        };
        let json = serde_json::to_value(&status)?;
        assert!(json.get("last_updated").is_some());
        assert!(json.get("id").is_none());
        Ok(())
    }
}
