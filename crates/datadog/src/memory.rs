//! In-memory `MonitorApi` for tests and dry runs.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::client::MonitorApi;
use crate::error::{Error, Result};
use crate::types::{MonitorId, MonitorRequest};

/// Calls kept by the in-memory API; older ones are dropped first.
pub const MAX_RECORDED_CALLS: usize = 1024;

/// A call received by the in-memory API, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    Create(MonitorRequest),
    Update(MonitorId, MonitorRequest),
    Delete(MonitorId),
}

/// Which API operation an injected failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Default)]
struct State {
    monitors: BTreeMap<MonitorId, MonitorRequest>,
    calls: VecDeque<ApiCall>,
    failures: HashMap<Operation, VecDeque<(u16, String)>>,
    next_id: MonitorId,
}

/// Monitor API that keeps monitors in a map and records every call.
#[derive(Debug, Clone)]
pub struct InMemoryMonitorApi {
    state: Arc<Mutex<State>>,
}

impl Default for InMemoryMonitorApi {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMonitorApi {
    /// Create an empty API whose first monitor gets id 1.
    pub fn new() -> Self {
        Self::with_first_id(1)
    }

    /// Create an empty API whose first monitor gets `id`.
    pub fn with_first_id(id: MonitorId) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                next_id: id,
                ..State::default()
            })),
        }
    }

    /// Make the next call of `operation` fail with the given HTTP status.
    ///
    /// A 404 on delete surfaces as `Error::NotFound`, like the HTTP client.
    pub async fn fail_next(&self, operation: Operation, status: u16, body: impl Into<String>) {
        self.state
            .lock()
            .await
            .failures
            .entry(operation)
            .or_default()
            .push_back((status, body.into()));
    }

    /// Drop a monitor as if someone deleted it in the Datadog UI.
    pub async fn forget(&self, id: MonitorId) -> Option<MonitorRequest> {
        self.state.lock().await.monitors.remove(&id)
    }

    /// The most recent calls, oldest first, at most [`MAX_RECORDED_CALLS`].
    pub async fn calls(&self) -> Vec<ApiCall> {
        self.state.lock().await.calls.iter().cloned().collect()
    }

    /// Current definition of a monitor.
    pub async fn monitor(&self, id: MonitorId) -> Option<MonitorRequest> {
        self.state.lock().await.monitors.get(&id).cloned()
    }

    /// Number of monitors that currently exist.
    pub async fn len(&self) -> usize {
        self.state.lock().await.monitors.len()
    }

    /// Check if no monitor exists.
    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.monitors.is_empty()
    }
}

impl State {
    fn record(&mut self, call: ApiCall) {
        if self.calls.len() >= MAX_RECORDED_CALLS {
            self.calls.pop_front();
        }
        self.calls.push_back(call);
    }

    fn injected(&mut self, operation: Operation, id: Option<MonitorId>) -> Result<()> {
        match self.failures.get_mut(&operation).and_then(VecDeque::pop_front) {
            Some((404, _)) if operation == Operation::Delete => {
                Err(Error::not_found(id.unwrap_or_default()))
            }
            Some((status, body)) => Err(Error::api(status, body)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MonitorApi for InMemoryMonitorApi {
    async fn create_monitor(&self, request: &MonitorRequest) -> Result<MonitorId> {
        let mut state = self.state.lock().await;
        state.record(ApiCall::Create(request.clone()));
        state.injected(Operation::Create, None)?;

        let id = state.next_id;
        state.next_id = id.saturating_add(1);
        state.monitors.insert(id, request.clone());
        debug!(monitor_id = id, "Created in-memory monitor");
        Ok(id)
    }

    async fn update_monitor(&self, id: MonitorId, request: &MonitorRequest) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record(ApiCall::Update(id, request.clone()));
        state.injected(Operation::Update, Some(id))?;

        match state.monitors.get_mut(&id) {
            Some(existing) => {
                *existing = request.clone();
                Ok(())
            }
            None => Err(Error::api(404, format!("Monitor {id} not found"))),
        }
    }

    async fn delete_monitor(&self, id: MonitorId) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record(ApiCall::Delete(id));
        state.injected(Operation::Delete, Some(id))?;

        state
            .monitors
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(id))
    }
}
