//! Operator configuration: defaults, then a TOML file, then the `DD_*`
//! environment, then command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use ddmon_datadog::DatadogConfig;
use ddmon_reconciler::{DEFAULT_REQUEUE_INTERVAL, LoopConfig, MAX_DELAY};

use crate::cli::Cli;

/// Resolved operator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    /// Directory holding Monitor manifests.
    pub manifests: PathBuf,

    /// Snapshot of the resource store, kept across restarts.
    pub state_file: PathBuf,

    /// Delay between periodic re-submissions of a synced monitor.
    #[serde(with = "duration_secs")]
    pub requeue_interval: Duration,

    /// Concurrent reconciles.
    pub workers: usize,

    /// Time in-flight reconciles get on shutdown.
    #[serde(with = "duration_secs")]
    pub shutdown_grace: Duration,

    pub log_json: bool,

    pub dry_run: bool,

    pub datadog: DatadogConfig,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        let loop_config = LoopConfig::default();
        Self {
            manifests: PathBuf::from("monitors"),
            state_file: PathBuf::from("ddmon-state.json"),
            requeue_interval: DEFAULT_REQUEUE_INTERVAL,
            workers: loop_config.workers,
            shutdown_grace: loop_config.shutdown_grace,
            log_json: false,
            dry_run: false,
            datadog: DatadogConfig::default(),
        }
    }
}

impl OperatorConfig {
    /// Read a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Build the effective config: defaults, then the config file, then the
    /// `DD_*` environment, then flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file is unreadable or a value is out of
    /// range.
    pub fn resolve(cli: &Cli) -> Result<Self> {
        Self::resolve_with(cli, |name| std::env::var(name).ok())
    }

    fn resolve_with(cli: &Cli, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.datadog = config.datadog.with_vars(env);

        if let Some(dir) = &cli.manifests {
            config.manifests.clone_from(dir);
        }
        if let Some(path) = &cli.state_file {
            config.state_file.clone_from(path);
        }
        if let Some(secs) = cli.requeue_secs {
            config.requeue_interval = Duration::from_secs(secs);
        }
        if let Some(workers) = cli.workers {
            config.workers = workers;
        }
        if let Some(key) = &cli.dd_api_key {
            config.datadog.api_key.clone_from(key);
        }
        if let Some(key) = &cli.dd_app_key {
            config.datadog.app_key.clone_from(key);
        }
        if let Some(url) = &cli.dd_api_url {
            config.datadog.api_url.clone_from(url);
        }
        config.log_json |= cli.log_json;
        config.dry_run |= cli.dry_run;

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges. Credentials are checked only when they are used.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending setting.
    pub fn validate(&self) -> Result<()> {
        if self.requeue_interval.is_zero() {
            bail!("requeue_interval must be at least one second");
        }
        if self.requeue_interval > MAX_DELAY {
            bail!(
                "requeue_interval must be at most {} seconds",
                MAX_DELAY.as_secs()
            );
        }
        self.loop_config()
            .validate()
            .context("Invalid loop settings")?;
        Ok(())
    }

    /// Settings for the reconciliation loop.
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            workers: self.workers,
            retry_interval: self.requeue_interval,
            shutdown_grace: self.shutdown_grace,
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
