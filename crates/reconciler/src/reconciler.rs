//! Reconciler implementation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use ddmon_api::{Monitor, MonitorStatus, ObjectKey, MONITOR_FINALIZER};
use ddmon_datadog::MonitorApi;

use crate::error::{Error, Result};
use crate::store::MonitorStore;
use crate::types::{Phase, Requeue};

/// Default delay between periodic re-submissions.
pub const DEFAULT_REQUEUE_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration for the reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Delay before a synced monitor is re-submitted.
    pub requeue_interval: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            requeue_interval: DEFAULT_REQUEUE_INTERVAL,
        }
    }
}

/// Level-triggered reconciler for Monitor resources.
///
/// Each call re-derives what to do from the stored resource alone and keeps
/// no memory between calls, so repeated or missed events are harmless.
pub struct Reconciler {
    /// Declarative store.
    store: Arc<dyn MonitorStore>,
    /// Datadog monitor API.
    api: Arc<dyn MonitorApi>,
    /// Configuration.
    config: ReconcilerConfig,
}

impl Reconciler {
    /// Create a new reconciler.
    pub fn new(
        store: Arc<dyn MonitorStore>,
        api: Arc<dyn MonitorApi>,
        config: ReconcilerConfig,
    ) -> Self {
        Self { store, api, config }
    }

    /// Reconcile the resource at `key` once.
    ///
    /// # Errors
    ///
    /// Returns the store or Datadog failure that stopped this pass. Datadog
    /// and translation failures are also written to `status.error` first.
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<Requeue> {
        let Some(mut monitor) = self.store.get(key).await? else {
            debug!(key = %key, "Monitor is gone, nothing to do");
            return Ok(Requeue::Never);
        };
        let phase = Phase::of(&monitor);
        debug!(key = %key, phase = %phase, "Reconciling monitor");

        match phase {
            Phase::Finalize => {
                self.finalize(&mut monitor).await?;
                Ok(Requeue::Never)
            }
            Phase::AttachFinalizer => {
                info!(key = %key, "Attaching finalizer");
                monitor.add_finalizer();
                self.store.update(&monitor).await?;
                Ok(Requeue::Immediately)
            }
            Phase::Create => {
                self.create(&mut monitor).await?;
                Ok(Requeue::After(self.config.requeue_interval))
            }
            Phase::Update => {
                self.update(&mut monitor).await?;
                Ok(Requeue::After(self.config.requeue_interval))
            }
        }
    }

    /// Create the Datadog monitor and record it in the status.
    async fn create(&self, monitor: &mut Monitor) -> Result<()> {
        let key = monitor.key();
        info!(key = %key, "Submitting monitor to Datadog");

        let request = match monitor.spec.to_request() {
            Ok(request) => request,
            Err(e) => return Err(self.record_failure(monitor, e.into()).await),
        };
        let id = match self.api.create_monitor(&request).await {
            Ok(id) => id,
            Err(e) => return Err(self.record_failure(monitor, e.into()).await),
        };

        monitor.status = MonitorStatus::created(id, Utc::now());
        self.store.update(monitor).await?;

        info!(key = %key, monitor_id = id, "Created monitor");
        Ok(())
    }

    /// Re-submit the full definition of an existing Datadog monitor.
    async fn update(&self, monitor: &mut Monitor) -> Result<()> {
        let key = monitor.key();
        let Some(id) = monitor.status.id else {
            let err = Error::inconsistent_status(&key, "active monitor has no Datadog id");
            return Err(self.record_failure(monitor, err).await);
        };
        debug!(key = %key, monitor_id = id, "Re-submitting monitor to Datadog");

        let request = match monitor.spec.to_request() {
            Ok(request) => request,
            Err(e) => return Err(self.record_failure(monitor, e.into()).await),
        };
        if let Err(e) = self.api.update_monitor(id, &request).await {
            return Err(self.record_failure(monitor, e.into()).await);
        }

        monitor.status.last_updated = Some(Utc::now());
        monitor.status.error = None;
        self.store.update(monitor).await?;
        Ok(())
    }

    /// Delete the Datadog monitor, then release the resource.
    ///
    /// The finalizer is only removed once Datadog confirms the monitor is
    /// gone, either by deleting it or by reporting it missing.
    async fn finalize(&self, monitor: &mut Monitor) -> Result<()> {
        let key = monitor.key();
        if !monitor.has_finalizer(MONITOR_FINALIZER) {
            debug!(key = %key, "No finalizer, nothing to clean up");
            return Ok(());
        }

        match monitor.status.id {
            Some(id) => {
                info!(key = %key, monitor_id = id, "Deleting monitor from Datadog");
                match self.api.delete_monitor(id).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {
                        info!(key = %key, monitor_id = id, "Monitor already gone from Datadog");
                    }
                    Err(e) => return Err(self.record_failure(monitor, e.into()).await),
                }
            }
            None => debug!(key = %key, "Monitor was never created in Datadog"),
        }

        info!(key = %key, "Removing finalizer");
        monitor.remove_finalizer();
        self.store.update(monitor).await?;
        Ok(())
    }

    /// Write the failure into the status and hand the error back.
    ///
    /// A failed status write is logged and does not replace the original
    /// error.
    async fn record_failure(&self, monitor: &mut Monitor, error: Error) -> Error {
        let key = monitor.key();
        warn!(key = %key, error = %error, "Reconcile step failed");

        monitor.status.error = Some(error.to_string());
        if let Err(persist_error) = self.store.update(monitor).await {
            warn!(
                key = %key,
                error = %persist_error,
                "Failed to record error in monitor status"
            );
        }
        error
    }

    /// Get the configuration.
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }
}

/// Builder for Reconciler.
pub struct ReconcilerBuilder {
    store: Option<Arc<dyn MonitorStore>>,
    api: Option<Arc<dyn MonitorApi>>,
    config: ReconcilerConfig,
}

impl ReconcilerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            store: None,
            api: None,
            config: ReconcilerConfig::default(),
        }
    }

    /// Set the store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn MonitorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the Datadog API.
    #[must_use]
    pub fn with_api(mut self, api: Arc<dyn MonitorApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Set the requeue interval.
    #[must_use]
    pub const fn requeue_interval(mut self, interval: Duration) -> Self {
        self.config.requeue_interval = interval;
        self
    }

    /// Build the reconciler.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the store or API is missing or the
    /// interval is zero.
    pub fn build(self) -> Result<Reconciler> {
        let store = self
            .store
            .ok_or_else(|| Error::invalid_config("Monitor store is required"))?;
        let api = self
            .api
            .ok_or_else(|| Error::invalid_config("Datadog API is required"))?;
        if self.config.requeue_interval.is_zero() {
            return Err(Error::invalid_config("Requeue interval must be positive"));
        }

        Ok(Reconciler::new(store, api, self.config))
    }
}

impl Default for ReconcilerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
