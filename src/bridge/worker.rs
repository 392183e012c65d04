//! Queue worker
//!
//! Long-polls a [`RequestQueue`] one message at a time and hands every
//! valid run request to a [`RunHandler`]. Messages are deleted once the
//! handler returns, whether it succeeded or not; garbled messages are
//! deleted without running anything. Queue transport errors back off for
//! a fixed delay and the loop carries on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::envelope::{QueueEnvelope, RunRequest, RunResult};
use super::queue::{QueueError, RequestQueue};
use crate::store::StoreError;

/// Executes one run request
#[async_trait]
pub trait RunHandler: Send + Sync {
    async fn handle(&self, request: RunRequest) -> Result<RunResult, StoreError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    pub poll_wait: Duration,
    pub error_backoff: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_wait: Duration::from_secs(10),
            error_backoff: Duration::from_millis(500),
        }
    }
}

/// What one poll iteration did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing arrived within the poll wait
    Idle,
    /// Message was not a run request and was dropped
    Discarded,
    /// A run request was handed to the handler
    Processed,
}

pub struct QueueWorker {
    queue: Arc<dyn RequestQueue>,
    handler: Arc<dyn RunHandler>,
    settings: WorkerSettings,
    stopping: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl QueueWorker {
    pub fn new(queue: Arc<dyn RequestQueue>, handler: Arc<dyn RunHandler>) -> Self {
        Self {
            queue,
            handler,
            settings: WorkerSettings::default(),
            stopping: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    pub fn with_settings(mut self, settings: WorkerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Spawn the polling loop. Calling `start` on a running worker is a
    /// no-op.
    pub async fn start(&self) {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return;
        }

        self.stopping.store(false, Ordering::SeqCst);
        let queue = Arc::clone(&self.queue);
        let handler = Arc::clone(&self.handler);
        let settings = self.settings.clone();
        let stopping = Arc::clone(&self.stopping);

        *task = Some(tokio::spawn(async move {
            run_loop(queue, handler, settings, stopping).await;
        }));
    }

    /// Ask the loop to stop and wait for its current iteration to finish.
    pub async fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(error = %e, "Queue worker task ended abnormally");
            }
        }
    }

    pub async fn is_running(&self) -> bool {
        self.task.lock().await.is_some()
    }

    /// One receive → handle → delete cycle.
    pub async fn poll_once(&self) -> Result<PollOutcome, QueueError> {
        poll_once(self.queue.as_ref(), &self.handler, &self.settings).await
    }
}

#[instrument(skip_all)]
async fn run_loop(
    queue: Arc<dyn RequestQueue>,
    handler: Arc<dyn RunHandler>,
    settings: WorkerSettings,
    stopping: Arc<AtomicBool>,
) {
    info!(poll_wait = ?settings.poll_wait, "Queue worker started");

    while !stopping.load(Ordering::SeqCst) {
        if let Err(e) = poll_once(queue.as_ref(), &handler, &settings).await {
            warn!(error = %e, "Queue transport error, backing off for {:?}", settings.error_backoff);
            tokio::time::sleep(settings.error_backoff).await;
        }
    }

    info!("Queue worker stopped");
}

async fn poll_once(
    queue: &dyn RequestQueue,
    handler: &Arc<dyn RunHandler>,
    settings: &WorkerSettings,
) -> Result<PollOutcome, QueueError> {
    let Some(message) = queue.receive(settings.poll_wait).await? else {
        return Ok(PollOutcome::Idle);
    };

    let request = match QueueEnvelope::decode(&message.body) {
        Ok(QueueEnvelope::RunRequest(request)) => request,
        Ok(QueueEnvelope::RunResult(_)) => {
            warn!("Discarding queue message with unexpected kind");
            queue.delete(&message.receipt_handle).await?;
            return Ok(PollOutcome::Discarded);
        }
        Err(e) => {
            warn!(error = %e, "Discarding unparseable queue message");
            queue.delete(&message.receipt_handle).await?;
            return Ok(PollOutcome::Discarded);
        }
    };

    let correlation_id = request.correlation_id.clone();
    debug!(correlation_id = %correlation_id, run_id = %request.run_id, "Handling run request");

    // Run on its own task so a panicking handler cannot take the loop down.
    let handler = Arc::clone(handler);
    match tokio::spawn(async move { handler.handle(request).await }).await {
        Ok(Ok(result)) => {
            debug!(correlation_id = %correlation_id, status = %result.status, "Run finished");
        }
        Ok(Err(e)) => {
            error!(correlation_id = %correlation_id, error = %e, "Run handler failed");
        }
        Err(e) => {
            error!(correlation_id = %correlation_id, error = %e, "Run handler panicked");
        }
    }

    queue.delete(&message.receipt_handle).await?;
    Ok(PollOutcome::Processed)
}
