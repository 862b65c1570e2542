//! Configuration for the Datadog client.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default Datadog API endpoint (US1 site).
pub const DEFAULT_API_URL: &str = "https://api.datadoghq.com/";

/// Configuration for the `DatadogClient`.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatadogConfig {
    /// Datadog API key, sent as `DD-API-KEY`.
    #[serde(default)]
    pub api_key: String,

    /// Datadog application key, sent as `DD-APPLICATION-KEY`.
    #[serde(default)]
    pub app_key: String,

    /// Base URL of the Datadog API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Timeout for a single request.
    #[serde(with = "duration_secs", default = "default_timeout")]
    pub timeout: Duration,
}

impl Default for DatadogConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            app_key: String::new(),
            api_url: default_api_url(),
            timeout: default_timeout(),
        }
    }
}

// Keys never end up in logs.
impl fmt::Debug for DatadogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatadogConfig")
            .field("api_key", &redact(&self.api_key))
            .field("app_key", &redact(&self.app_key))
            .field("api_url", &self.api_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl DatadogConfig {
    /// Create a config with the given credentials.
    pub fn new(api_key: impl Into<String>, app_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            app_key: app_key.into(),
            ..Default::default()
        }
    }

    /// Set the API base URL.
    #[must_use]
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overlay `DD_API_KEY`, `DD_APP_KEY` and `DD_API_URL`, as read through
    /// `lookup`, where they are set.
    #[must_use]
    pub fn with_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(key) = lookup("DD_API_KEY") {
            self.api_key = key;
        }
        if let Some(key) = lookup("DD_APP_KEY") {
            self.app_key = key;
        }
        if let Some(url) = lookup("DD_API_URL") {
            self.api_url = url;
        }
        self
    }

    /// Check that credentials are present.
    ///
    /// # Errors
    ///
    /// Returns a config error naming the first missing key.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(Error::config_error("Datadog API key is not set"));
        }
        if self.app_key.is_empty() {
            return Err(Error::config_error("Datadog application key is not set"));
        }
        Ok(())
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

const fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Serialization helper for Duration as seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DatadogConfig::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = DatadogConfig::new("api", "app")
            .api_url("http://localhost:8126/")
            .timeout(Duration::from_secs(5));

        assert_eq!(config.api_key, "api");
        assert_eq!(config.app_key, "app");
        assert_eq!(config.api_url, "http://localhost:8126/");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_keys() {
        let config = DatadogConfig::new("secret-api", "secret-app");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-api"));
        assert!(!rendered.contains("secret-app"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_env_overlays_only_set_vars() {
        let config = DatadogConfig::new("file-api", "file-app")
            .api_url("https://api.datadoghq.eu/")
            .with_vars(|name| (name == "DD_APP_KEY").then(|| "env-app".to_string()));

        assert_eq!(config.api_key, "file-api");
        assert_eq!(config.app_key, "env-app");
        assert_eq!(config.api_url, "https://api.datadoghq.eu/");
    }

    #[test]
    fn test_toml_defaults() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let config: DatadogConfig = toml::from_str("api_key = \"a\"\napp_key = \"b\"\ntimeout = 7\n")?;
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.timeout, Duration::from_secs(7));
        Ok(())
    }
}
