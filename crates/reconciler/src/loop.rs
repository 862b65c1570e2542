//! Continuous reconciliation loop.
//!
//! Feeds keys from the store's watch stream and from requeue directives into
//! a [`WorkQueue`], and runs up to `workers` reconciles at a time, each holding
//! a semaphore permit. A key is never reconciled by two workers at once.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch, Semaphore};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use ddmon_api::ObjectKey;

use crate::error::{Error, Result};
use crate::queue::{deadline_after, WorkQueue, MAX_DELAY};
use crate::reconciler::{Reconciler, DEFAULT_REQUEUE_INTERVAL};
use crate::store::{MonitorStore, StoreEvent};
use crate::types::Requeue;

/// How long the loop sleeps when nothing is queued.
const IDLE_WAIT: Duration = Duration::from_secs(3600);

/// Outcome of one reconcile, sent back by its worker.
type Completion = (ObjectKey, Result<Requeue>);

/// Configuration for the reconciliation loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Maximum concurrent reconciles.
    pub workers: usize,
    /// Delay before a failed key is retried.
    pub retry_interval: Duration,
    /// Time given to in-flight reconciles when the loop stops.
    pub shutdown_grace: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            retry_interval: DEFAULT_REQUEUE_INTERVAL,
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

impl LoopConfig {
    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for zero workers, more workers than a
    /// semaphore can count, or a retry interval longer than [`MAX_DELAY`].
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::invalid_config("workers must be at least 1"));
        }
        if self.workers > Semaphore::MAX_PERMITS || u32::try_from(self.workers).is_err() {
            return Err(Error::invalid_config(format!(
                "workers must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.retry_interval > MAX_DELAY {
            return Err(Error::invalid_config(format!(
                "retry_interval must be at most {}s",
                MAX_DELAY.as_secs()
            )));
        }
        Ok(())
    }
}

/// Continuous reconciliation loop.
pub struct ReconciliationLoop {
    /// The reconciler.
    reconciler: Arc<Reconciler>,
    /// Store to list and watch.
    store: Arc<dyn MonitorStore>,
    /// Loop configuration.
    config: LoopConfig,
    /// Stop signal receiver.
    stop_rx: watch::Receiver<bool>,
    /// Stop signal sender (for external control).
    stop_tx: watch::Sender<bool>,
}

impl ReconciliationLoop {
    /// Create a new reconciliation loop.
    pub fn new(
        reconciler: Arc<Reconciler>,
        store: Arc<dyn MonitorStore>,
        config: LoopConfig,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            reconciler,
            store,
            config,
            stop_rx,
            stop_tx,
        }
    }

    /// Run the loop until stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the initial listing
    /// fails, or the store's watch stream closes.
    pub async fn run(&mut self) -> Result<()> {
        self.config.validate()?;
        info!(workers = self.config.workers, "Starting reconciliation loop");

        let mut events = self.store.watch();
        let mut queue = WorkQueue::new();
        self.resync(&mut queue).await?;

        let permits = Arc::new(Semaphore::new(self.config.workers));
        let (done_tx, mut done_rx) = mpsc::channel::<Completion>(self.config.workers);

        loop {
            self.dispatch(&mut queue, &permits, &done_tx);
            let wake_at = next_wake(&queue, permits.available_permits(), Instant::now());

            tokio::select! {
                changed = self.stop_rx.changed() => {
                    if changed.is_err() || *self.stop_rx.borrow() {
                        break;
                    }
                }
                event = events.recv() => match event {
                    Ok(StoreEvent::Applied(key)) => {
                        debug!(key = %key, "Store change");
                        queue.add(key);
                    }
                    Ok(StoreEvent::Deleted(key)) => {
                        debug!(key = %key, "Resource erased");
                        queue.forget(&key);
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "Watch stream lagged, resyncing");
                        self.resync(&mut queue).await?;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        error!("Watch stream closed");
                        return Err(Error::LoopStopped);
                    }
                },
                Some((key, outcome)) = done_rx.recv() => {
                    self.complete(&mut queue, key, outcome);
                }
                () = tokio::time::sleep_until(wake_at) => {}
            }
        }

        self.drain(&permits).await;
        info!("Reconciliation loop stopped");
        Ok(())
    }

    /// Queue every stored key for an immediate reconcile.
    async fn resync(&self, queue: &mut WorkQueue) -> Result<()> {
        let keys = self.store.list().await?;
        debug!(count = keys.len(), "Queueing all monitors");
        for key in keys {
            queue.add(key);
        }
        Ok(())
    }

    /// Hand due keys to workers while permits are free.
    fn dispatch(
        &self,
        queue: &mut WorkQueue,
        permits: &Arc<Semaphore>,
        done_tx: &mpsc::Sender<Completion>,
    ) {
        while let Ok(permit) = Arc::clone(permits).try_acquire_owned() {
            let Some(key) = queue.pop_ready(Instant::now()) else {
                break;
            };
            let reconciler = Arc::clone(&self.reconciler);
            let done_tx = done_tx.clone();
            tokio::spawn(async move {
                let outcome = reconciler.reconcile(&key).await;
                // Release the slot before reporting back.
                drop(permit);
                if done_tx.send((key, outcome)).await.is_err() {
                    debug!("Loop exited before the reconcile finished");
                }
            });
        }
    }

    /// Apply the outcome of a reconcile to the queue.
    fn complete(&self, queue: &mut WorkQueue, key: ObjectKey, outcome: Result<Requeue>) {
        queue.done(&key);
        match outcome {
            Ok(requeue) => {
                if let Some(delay) = requeue.delay() {
                    queue.add_after(key, delay);
                }
            }
            Err(e) => {
                error!(
                    key = %key,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Reconcile failed"
                );
                queue.add_after(key, self.config.retry_interval);
            }
        }
    }

    /// Give in-flight reconciles a bounded time to finish.
    ///
    /// Every worker holds a permit, so owning all of them means none is left.
    async fn drain(&self, permits: &Semaphore) {
        let in_flight = self.config.workers.saturating_sub(permits.available_permits());
        if in_flight == 0 {
            return;
        }
        debug!(in_flight, "Waiting for in-flight reconciles");

        let all = u32::try_from(self.config.workers).unwrap_or(u32::MAX);
        match tokio::time::timeout(self.config.shutdown_grace, permits.acquire_many(all)).await {
            Ok(Ok(_all_permits)) => {}
            Ok(Err(e)) => error!(error = %e, "Worker permits closed"),
            Err(_) => warn!(
                in_flight = self.config.workers.saturating_sub(permits.available_permits()),
                "Reconciles still in flight at shutdown"
            ),
        }
    }

    /// Get a stopper handle.
    pub fn stopper(&self) -> LoopStopper {
        LoopStopper {
            stop_tx: self.stop_tx.clone(),
        }
    }
}

/// When the loop next has dispatching to do.
///
/// With every permit taken only a completion can free a worker, so a due key
/// is not a reason to wake.
fn next_wake(queue: &WorkQueue, free_permits: usize, now: Instant) -> Instant {
    let idle = deadline_after(now, IDLE_WAIT);
    if free_permits == 0 {
        return idle;
    }
    queue.next_deadline().map_or(idle, |at| at.min(idle))
}

/// Handle to stop a reconciliation loop.
#[derive(Clone)]
pub struct LoopStopper {
    stop_tx: watch::Sender<bool>,
}

impl LoopStopper {
    /// Stop the loop.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}
