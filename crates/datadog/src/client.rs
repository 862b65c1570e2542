//! Datadog monitor API client.
//!
//! This module provides the `MonitorApi` seam the reconciler calls and
//! `DatadogClient`, its HTTP implementation against the v1 monitor API.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, info};
use url::Url;

use crate::config::DatadogConfig;
use crate::error::{Error, Result};
use crate::types::{MonitorId, MonitorRequest, MonitorResponse};

/// Operations against the external alerting service.
#[async_trait]
pub trait MonitorApi: Send + Sync {
    /// Create a monitor and return the id Datadog assigned to it.
    async fn create_monitor(&self, request: &MonitorRequest) -> Result<MonitorId>;

    /// Replace the definition of an existing monitor.
    async fn update_monitor(&self, id: MonitorId, request: &MonitorRequest) -> Result<()>;

    /// Delete a monitor.
    ///
    /// Fails with `Error::NotFound` when the monitor no longer exists, so
    /// callers can tell "already gone" apart from other failures.
    async fn delete_monitor(&self, id: MonitorId) -> Result<()>;
}

/// HTTP client for the Datadog monitor API.
#[derive(Debug, Clone)]
pub struct DatadogClient {
    config: Arc<DatadogConfig>,
    base_url: Url,
    http_client: reqwest::Client,
}

impl DatadogClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the API URL does not parse or the HTTP client
    /// cannot be built.
    pub fn new(config: DatadogConfig) -> Result<Self> {
        let base_url = Url::parse(&config.api_url)?;
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            config: Arc::new(config),
            base_url,
            http_client,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &DatadogConfig {
        &self.config
    }

    fn monitors_url(&self) -> Result<Url> {
        Ok(self.base_url.join("api/v1/monitor")?)
    }

    fn monitor_url(&self, id: MonitorId) -> Result<Url> {
        Ok(self.base_url.join(&format!("api/v1/monitor/{id}"))?)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("DD-API-KEY", &self.config.api_key)
            .header("DD-APPLICATION-KEY", &self.config.app_key)
    }
}

/// Turn a non-success response into an `Error::Api`.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .map_err(|e| Error::invalid_response(format!("Failed to read error body: {e}")))?;
    Err(Error::api(status.as_u16(), body))
}

#[async_trait]
impl MonitorApi for DatadogClient {
    async fn create_monitor(&self, request: &MonitorRequest) -> Result<MonitorId> {
        let url = self.monitors_url()?;
        debug!(name = %request.name, "Creating Datadog monitor");

        let response = self
            .authorized(self.http_client.post(url))
            .json(request)
            .send()
            .await?;
        let created: MonitorResponse = check_status(response).await?.json().await?;

        info!(monitor_id = created.id, name = %request.name, "Created Datadog monitor");
        Ok(created.id)
    }

    async fn update_monitor(&self, id: MonitorId, request: &MonitorRequest) -> Result<()> {
        let url = self.monitor_url(id)?;
        debug!(monitor_id = id, "Updating Datadog monitor");

        let response = self
            .authorized(self.http_client.put(url))
            .json(request)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn delete_monitor(&self, id: MonitorId) -> Result<()> {
        let url = self.monitor_url(id)?;
        debug!(monitor_id = id, "Deleting Datadog monitor");

        let response = self
            .authorized(self.http_client.delete(url))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::not_found(id));
        }
        check_status(response).await?;

        info!(monitor_id = id, "Deleted Datadog monitor");
        Ok(())
    }
}
