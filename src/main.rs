//! # ddmon - Datadog monitor operator
//!
//! ## Startup
//!
//! 1. **Configuration** - config file, then environment, then flags
//! 2. **Datadog client** - real API, or in-memory with `--dry-run`
//! 3. **Store** - snapshot reopened, then synced with the manifest directory
//! 4. **Manifest watcher** - edits and removals are synced as they happen
//! 5. **Reconciliation loop** - runs until Ctrl+C
//!
//! ## Shutdown
//!
//! Ctrl+C stops the loop; in-flight reconciles get `shutdown_grace` to finish.

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::panic)]
#![deny(clippy::expect_used)]

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ddmon::cli::Cli;
use ddmon::config::OperatorConfig;
use ddmon::datadog::{DatadogClient, InMemoryMonitorApi, MonitorApi};
use ddmon::manifests;
use ddmon::reconciler::{InMemoryMonitorStore, ReconcilerBuilder, ReconciliationLoop};
use ddmon::watcher::{self, DEFAULT_DEBOUNCE};

#[tokio::main]
async fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    let config = OperatorConfig::resolve(&cli).context("Invalid configuration")?;

    init_tracing(config.log_json);
    info!(
        manifests = %config.manifests.display(),
        state_file = %config.state_file.display(),
        workers = config.workers,
        requeue_secs = config.requeue_interval.as_secs(),
        dry_run = config.dry_run,
        "ddmon starting"
    );

    let api = init_api(&config)?;

    let store = init_store(&config).await?;
    manifests::sync(&store, &config.manifests)
        .await
        .context("Failed to load monitor manifests")?;

    let (_watcher, changes) = watcher::watch_dir(&config.manifests, DEFAULT_DEBOUNCE)
        .context("Failed to watch monitor manifests")?;
    let follower = tokio::spawn(manifests::follow(
        store.clone(),
        config.manifests.clone(),
        changes,
    ));

    let reconciler = ReconcilerBuilder::new()
        .with_store(store.clone())
        .with_api(api)
        .requeue_interval(config.requeue_interval)
        .build()
        .context("Failed to build reconciler")?;

    let mut loop_runner =
        ReconciliationLoop::new(Arc::new(reconciler), store, config.loop_config());
    let stopper = loop_runner.stopper();
    let mut handle = tokio::spawn(async move { loop_runner.run().await });

    info!(
        "ddmon started in {:?}. Press Ctrl+C to stop.",
        start_time.elapsed()
    );

    tokio::select! {
        () = wait_for_shutdown() => stopper.stop(),
        joined = &mut handle => {
            return joined
                .context("Reconciliation loop task failed")?
                .context("Reconciliation loop exited");
        }
    }

    follower.abort();
    handle
        .await
        .context("Reconciliation loop task failed")?
        .context("Reconciliation loop exited with an error")?;

    info!("ddmon stopped gracefully");
    Ok(())
}

/// Initialize tracing subscriber with environment filter.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Build the Datadog API the reconciler talks to.
fn init_api(config: &OperatorConfig) -> Result<Arc<dyn MonitorApi>> {
    if config.dry_run {
        info!("Dry run: monitors are kept in memory, Datadog is not contacted");
        return Ok(Arc::new(InMemoryMonitorApi::new()));
    }

    config
        .datadog
        .validate()
        .context("Datadog credentials are missing; set DD_API_KEY and DD_APP_KEY")?;
    let client = DatadogClient::new(config.datadog.clone())
        .context("Failed to build Datadog client")?;
    info!(api_url = %config.datadog.api_url, "Datadog client ready");
    Ok(Arc::new(client))
}

/// Open the resource store. Dry runs keep nothing on disk, so fake Datadog
/// ids never reach the snapshot a real run would read.
async fn init_store(config: &OperatorConfig) -> Result<Arc<InMemoryMonitorStore>> {
    if config.dry_run {
        return Ok(InMemoryMonitorStore::new_arc());
    }
    let store = InMemoryMonitorStore::open(&config.state_file)
        .await
        .with_context(|| format!("Failed to open state file {}", config.state_file.display()))?;
    Ok(Arc::new(store))
}

/// Wait for shutdown signal (Ctrl+C).
async fn wait_for_shutdown() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown"),
        Err(err) => error!("Failed to listen for shutdown signal: {}", err),
    }
}
