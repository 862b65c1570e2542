//! Reading Monitor resources from YAML manifests.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::monitor::{Monitor, KIND};

/// Parse every Monitor in a (possibly multi-document) YAML string.
///
/// Empty documents are skipped. Status and store-owned metadata in the
/// manifest are discarded: a resource always enters the store fresh.
///
/// # Errors
///
/// Returns an error if a document is not valid YAML, not a Monitor, or has
/// no name.
pub fn parse_monitors(yaml: &str) -> Result<Vec<Monitor>> {
    let mut monitors = Vec::new();

    for document in serde_yaml::Deserializer::from_str(yaml) {
        let value = serde_yaml::Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }

        let mut monitor: Monitor = serde_yaml::from_value(value)?;
        if monitor.kind != KIND {
            return Err(Error::invalid_manifest(format!(
                "expected kind {KIND}, found {}",
                monitor.kind
            )));
        }
        if monitor.metadata.name.is_empty() {
            return Err(Error::invalid_manifest("metadata.name is required"));
        }

        monitor.status = Default::default();
        monitor.metadata.resource_version = 0;
        monitor.metadata.generation = 0;
        monitor.metadata.deletion_timestamp = None;
        monitor.metadata.finalizers.clear();
        monitors.push(monitor);
    }

    Ok(monitors)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
apiVersion: datadog.github.com/v1alpha1
kind: Monitor
metadata:
  name: cpu-high
  namespace: infra
spec:
  name: cpu-high
  type: metric alert
  query: avg(last_5m):system.cpu>80
  tags: [team:infra]
  options:
    notify_no_data: false
    thresholds:
      critical: "80"
      warning: ""
---
kind: Monitor
metadata:
  name: disk-full
spec:
  name: disk-full
  type: metric alert
  query: avg(last_5m):system.disk.in_use>0.9
status:
  active: true
  id: 55
---
"#;

    #[test]
    fn test_parse_multi_document() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let monitors = parse_monitors(MANIFEST)?;
        assert_eq!(monitors.len(), 2);

        let cpu = monitors.first().ok_or("first monitor missing")?;
        assert_eq!(cpu.key().to_string(), "infra/cpu-high");
        assert_eq!(cpu.spec.monitor_type, "metric alert");
        assert_eq!(cpu.spec.options.notify_no_data, Some(false));
        assert_eq!(cpu.spec.options.notify_audit, None);
        assert_eq!(cpu.spec.options.thresholds.critical, "80");

        let disk = monitors.get(1).ok_or("second monitor missing")?;
        assert_eq!(disk.metadata.namespace, "default");
        assert!(!disk.status.active);
        assert_eq!(disk.status.id, None);
        Ok(())
    }

    #[test]
    fn test_rejects_other_kinds() {
        let yaml = "kind: ConfigMap\nmetadata:\n  name: x\nspec:\n  name: x\n  type: t\n  query: q\n";
        assert!(matches!(
            parse_monitors(yaml),
            Err(Error::InvalidManifest { .. })
        ));
    }

    #[test]
    fn test_rejects_missing_spec() {
        assert!(parse_monitors("kind: Monitor\nmetadata:\n  name: x\n").is_err());
    }
}
