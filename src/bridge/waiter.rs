//! Correlation waiter
//!
//! Lets a caller block on a result produced elsewhere (typically by the
//! queue worker). Each correlation id maps to a single-use oneshot sender;
//! whoever removes the entry first (resolve, reject or timeout eviction)
//! decides the outcome, so a result is delivered at most once.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::debug;

use super::envelope::RunResult;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    #[error("Timed out waiting for workflow result")]
    Timeout,

    #[error("{0}")]
    Rejected(String),

    #[error("Waiter dropped before a result arrived")]
    Closed,

    #[error("Correlation id already pending: {0}")]
    Duplicate(String),
}

type Slot = oneshot::Sender<Result<RunResult, WaitError>>;

#[derive(Clone, Default)]
pub struct RunWaiter {
    pending: Arc<DashMap<String, Slot>>,
}

impl RunWaiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `correlation_id` before the work is dispatched, so an
    /// early result cannot be missed.
    pub fn register(&self, correlation_id: &str) -> Result<PendingRun, WaitError> {
        let (tx, rx) = oneshot::channel();
        match self.pending.entry(correlation_id.to_string()) {
            Entry::Occupied(_) => return Err(WaitError::Duplicate(correlation_id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(tx);
            }
        }
        Ok(PendingRun {
            correlation_id: correlation_id.to_string(),
            rx: Some(rx),
            pending: Arc::clone(&self.pending),
        })
    }

    /// Register and wait in one call.
    pub async fn wait_for(
        &self,
        correlation_id: &str,
        timeout: Duration,
    ) -> Result<RunResult, WaitError> {
        self.register(correlation_id)?.wait(timeout).await
    }

    /// Deliver `result`. Returns `false` when nobody is waiting.
    pub fn resolve(&self, correlation_id: &str, result: RunResult) -> bool {
        self.complete(correlation_id, Ok(result))
    }

    /// Fail the waiter for `correlation_id`. Returns `false` when nobody is
    /// waiting.
    pub fn reject(&self, correlation_id: &str, message: impl Into<String>) -> bool {
        self.complete(correlation_id, Err(WaitError::Rejected(message.into())))
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn complete(&self, correlation_id: &str, outcome: Result<RunResult, WaitError>) -> bool {
        match self.pending.remove(correlation_id) {
            Some((_, tx)) => tx.send(outcome).is_ok(),
            None => {
                debug!(correlation_id, "No waiter for correlation id");
                false
            }
        }
    }
}

/// A registered wait. Dropping it without waiting releases the id.
pub struct PendingRun {
    correlation_id: String,
    rx: Option<oneshot::Receiver<Result<RunResult, WaitError>>>,
    pending: Arc<DashMap<String, Slot>>,
}

impl PendingRun {
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Suspend until resolved, rejected or `timeout` elapses. On timeout the
    /// entry is evicted and any later resolve is a no-op.
    pub async fn wait(mut self, timeout: Duration) -> Result<RunResult, WaitError> {
        let Some(rx) = self.rx.take() else {
            return Err(WaitError::Closed);
        };
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(WaitError::Closed),
            Err(_) => {
                self.pending.remove(&self.correlation_id);
                Err(WaitError::Timeout)
            }
        }
    }
}

impl Drop for PendingRun {
    fn drop(&mut self) {
        if self.rx.is_some() {
            self.pending.remove(&self.correlation_id);
        }
    }
}
