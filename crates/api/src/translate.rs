//! Translation of a `MonitorSpec` into a Datadog `MonitorRequest`.
//!
//! Pure and deterministic: the same spec always yields the same request.
//! Query config, threshold period, time aggregator and threshold windows are
//! not modeled yet and always go out unset, whatever the spec holds.

use ddmon_datadog::{MonitorOptions, MonitorRequest, ThresholdValue};

use crate::error::Result;
use crate::monitor::{MonitorSpec, Options, Thresholds};

impl MonitorSpec {
    /// Build the request Datadog expects for this spec.
    ///
    /// # Errors
    ///
    /// Returns `Error::Translate` if a threshold is not a decimal number.
    pub fn to_request(&self) -> Result<MonitorRequest> {
        Ok(MonitorRequest {
            monitor_type: self.monitor_type.clone(),
            query: self.query.clone(),
            name: self.name.clone(),
            message: self.message.clone(),
            tags: self.tags.clone(),
            options: Some(self.options.to_api()?),
        })
    }
}

impl Options {
    fn to_api(&self) -> Result<MonitorOptions> {
        Ok(MonitorOptions {
            no_data_timeframe: self.no_data_timeframe,
            notify_audit: self.notify_audit,
            notify_no_data: self.notify_no_data,
            renotify_interval: self.renotify_interval,
            new_host_delay: self.new_host_delay,
            evaluation_delay: self.evaluation_delay,
            silenced: self.silenced.clone(),
            timeout_h: self.timeout_h,
            escalation_message: self.escalation_message.clone(),
            thresholds: Some(self.thresholds.to_api()?),
            threshold_windows: None,
            include_tags: self.include_tags,
            require_full_window: self.require_full_window,
            locked: self.locked,
            enable_logs_sample: self.enable_logs_sample,
            query_config: None,
        })
    }
}

impl Thresholds {
    fn to_api(&self) -> Result<ddmon_datadog::Thresholds> {
        Ok(ddmon_datadog::Thresholds {
            ok: threshold("ok", &self.ok)?,
            critical: threshold("critical", &self.critical)?,
            warning: threshold("warning", &self.warning)?,
            unknown: threshold("unknown", &self.unknown)?,
            critical_recovery: threshold("critical_recovery", &self.critical_recovery)?,
            warning_recovery: threshold("warning_recovery", &self.warning_recovery)?,
            period: None,
            time_aggregator: None,
        })
    }
}

/// Empty means unset, anything else must be a number.
fn threshold(field: &str, text: &str) -> Result<Option<ThresholdValue>> {
    if text.is_empty() {
        return Ok(None);
    }
    Ok(Some(ThresholdValue::parse(field, text)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{LogSet, Period, QueryConfig};
    use crate::Error;

    fn cpu_spec() -> MonitorSpec {
        MonitorSpec::new("cpu-high", "metric alert", "avg(last_5m):system.cpu>80")
    }

    #[test]
    fn test_required_fields_copied() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let request = cpu_spec().message("CPU is high @pagerduty").tag("team:infra").to_request()?;

        assert_eq!(request.name, "cpu-high");
        assert_eq!(request.monitor_type, "metric alert");
        assert_eq!(request.query, "avg(last_5m):system.cpu>80");
        assert_eq!(request.message, "CPU is high @pagerduty");
        assert_eq!(request.tags, vec!["team:infra"]);
        Ok(())
    }

    #[test]
    fn test_default_options_leave_everything_unset() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let request = cpu_spec().to_request()?;
        let json = serde_json::to_value(&request)?;

        assert_eq!(json.pointer("/options"), Some(&serde_json::json!({"thresholds": {}})));
        assert_eq!(json.pointer("/tags"), Some(&serde_json::json!([])));
        Ok(())
    }

    #[test]
    fn test_explicit_zero_and_false_survive() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let options = Options {
            notify_no_data: Some(false),
            renotify_interval: Some(0),
            evaluation_delay: Some(0),
            timeout_h: Some(0),
            locked: Some(false),
            ..Options::default()
        };
        let request = cpu_spec().options(options).to_request()?;
        let json = serde_json::to_value(&request)?;

        assert_eq!(json.pointer("/options/notify_no_data"), Some(&serde_json::json!(false)));
        assert_eq!(json.pointer("/options/renotify_interval"), Some(&serde_json::json!(0)));
        assert_eq!(json.pointer("/options/evaluation_delay"), Some(&serde_json::json!(0)));
        assert_eq!(json.pointer("/options/timeout_h"), Some(&serde_json::json!(0)));
        assert_eq!(json.pointer("/options/locked"), Some(&serde_json::json!(false)));
        assert!(json.pointer("/options/notify_audit").is_none());
        Ok(())
    }

    #[test]
    fn test_thresholds() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut options = Options::default();
        options.thresholds.critical = "80".to_string();
        options.thresholds.warning_recovery = "72.50".to_string();

        let request = cpu_spec().options(options).to_request()?;
        let thresholds = request
            .options
            .and_then(|o| o.thresholds)
            .ok_or("thresholds missing")?;

        assert_eq!(thresholds.critical.as_ref().map(ThresholdValue::as_str), Some("80"));
        assert_eq!(thresholds.critical.as_ref().and_then(ThresholdValue::as_f64), Some(80.0));
        assert_eq!(
            thresholds.warning_recovery.as_ref().map(ThresholdValue::as_str),
            Some("72.50")
        );
        assert!(thresholds.ok.is_none());
        assert!(thresholds.warning.is_none());
        Ok(())
    }

    #[test]
    fn test_non_numeric_threshold_fails() {
        let mut options = Options::default();
        options.thresholds.critical = "very high".to_string();

        let result = cpu_spec().options(options).to_request();
        assert!(matches!(result, Err(Error::Translate(_))));
    }

    #[test]
    fn test_unmodeled_blocks_stay_unset() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut options = Options::default();
        options.thresholds.period = Period {
            seconds: 300,
            text: "5 minutes".to_string(),
            ..Period::default()
        };
        options.thresholds.time_aggregator = "avg".to_string();
        options.query_config = QueryConfig {
            log_set: LogSet {
                id: 3,
                name: "main".to_string(),
            },
            query_string: "status:error".to_string(),
            ..QueryConfig::default()
        };

        let request = cpu_spec().options(options).to_request()?;
        let api_options = request.options.ok_or("options missing")?;

        assert!(api_options.query_config.is_none());
        assert!(api_options.threshold_windows.is_none());
        let thresholds = api_options.thresholds.ok_or("thresholds missing")?;
        assert!(thresholds.period.is_none());
        assert!(thresholds.time_aggregator.is_none());
        Ok(())
    }
}
