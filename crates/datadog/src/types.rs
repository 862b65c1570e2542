//! Wire model of the Datadog v1 monitor API.
//!
//! Every optional field is an `Option` that is left off the wire when `None`,
//! so an unset value never reaches Datadog as a zero or `false`.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;

use crate::error::{Error, Result};

/// Identifier Datadog assigns to a monitor.
pub type MonitorId = i64;

/// A monitor definition as sent to `POST /api/v1/monitor` and
/// `PUT /api/v1/monitor/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorRequest {
    #[serde(rename = "type")]
    pub monitor_type: String,
    pub query: String,
    pub name: String,
    pub message: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<MonitorOptions>,
}

/// Monitor options block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<Thresholds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_windows: Option<ThresholdWindows>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_tags: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_full_window: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_logs_sample: Option<bool>,
    #[serde(
        rename = "queryConfig",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub query_config: Option<QueryConfig>,
}

/// Alerting thresholds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<ThresholdValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical: Option<ThresholdValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<ThresholdValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unknown: Option<ThresholdValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_recovery: Option<ThresholdValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning_recovery: Option<ThresholdValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
    #[serde(
        rename = "timeAggregator",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub time_aggregator: Option<String>,
}

/// Evaluation period of a threshold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Anomaly monitor threshold windows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdWindows {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_window: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_window: Option<String>,
}

/// Log monitor query configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(rename = "logset", default, skip_serializing_if = "Option::is_none")]
    pub log_set: Option<LogSet>,
    #[serde(rename = "timeRange", default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
    #[serde(rename = "queryString", default, skip_serializing_if = "Option::is_none")]
    pub query_string: Option<String>,
    #[serde(rename = "queryIsFailed", default, skip_serializing_if = "Option::is_none")]
    pub query_is_failed: Option<bool>,
}

/// Log index a log monitor runs against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Time range of a log monitor query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live: Option<bool>,
}

/// Subset of the monitor returned by the API that the operator reads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MonitorResponse {
    pub id: MonitorId,
    #[serde(default)]
    pub name: Option<String>,
}

/// A decimal threshold kept in its original textual form.
///
/// Serialized as a bare JSON number with the exact digits it was parsed from,
/// so `"0.10"` goes out as `0.10` and not `0.1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThresholdValue(String);

impl ThresholdValue {
    /// Parse a threshold, keeping its exact text.
    ///
    /// # Errors
    ///
    /// Returns `InvalidThreshold` if `text` is not a JSON number.
    pub fn parse(field: &str, text: &str) -> Result<Self> {
        let is_number = !text.is_empty()
            && text.trim() == text
            && serde_json::from_str::<serde_json::Number>(text).is_ok();
        if is_number {
            Ok(Self(text.to_string()))
        } else {
            Err(Error::invalid_threshold(field, text))
        }
    }

    /// Textual value as written in the monitor spec.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value, for callers that need to compare thresholds.
    pub fn as_f64(&self) -> Option<f64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for ThresholdValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ThresholdValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let raw = RawValue::from_string(self.0.clone()).map_err(S::Error::custom)?;
        raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ThresholdValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        Self::parse("threshold", raw.get()).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_rejects_non_numbers() {
        assert!(ThresholdValue::parse("critical", "").is_err());
        assert!(ThresholdValue::parse("critical", "high").is_err());
        assert!(ThresholdValue::parse("critical", " 80").is_err());
        assert!(ThresholdValue::parse("critical", "80").is_ok());
        assert!(ThresholdValue::parse("critical", "-0.5").is_ok());
    }

    #[test]
    fn test_threshold_serializes_exact_text() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let thresholds = Thresholds {
            critical: Some(ThresholdValue::parse("critical", "0.10")?),
            ..Default::default()
        };
        let json = serde_json::to_string(&thresholds)?;
        assert_eq!(json, r#"{"critical":0.10}"#);

        let back: Thresholds = serde_json::from_str(&json)?;
        assert_eq!(back.critical.as_ref().map(ThresholdValue::as_str), Some("0.10"));
        Ok(())
    }

    #[test]
    fn test_unset_options_are_omitted() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let options = MonitorOptions {
            notify_no_data: Some(false),
            renotify_interval: Some(0),
            ..Default::default()
        };
        let json = serde_json::to_value(&options)?;
        assert_eq!(
            json,
            serde_json::json!({"notify_no_data": false, "renotify_interval": 0})
        );
        Ok(())
    }

    #[test]
    fn test_request_uses_type_key() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let request = MonitorRequest {
            monitor_type: "metric alert".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&request)?;
        assert_eq!(json.pointer("/type"), Some(&serde_json::json!("metric alert")));
        assert_eq!(json.pointer("/tags"), Some(&serde_json::json!([])));
        Ok(())
    }
}
