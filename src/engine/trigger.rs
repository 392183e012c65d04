//! Trigger handling
//!
//! Resolves `/t/<token>` to a workflow, creates the run record and either
//! executes it inline or enqueues it and waits for the worker's result.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::result::{ExecutionStatus, RunError, TraceEntry};
use super::run::RunOrchestrator;
use crate::bridge::envelope::{QueueEnvelope, RunRequest, RunResult};
use crate::bridge::queue::{QueueError, RequestQueue};
use crate::bridge::waiter::{RunWaiter, WaitError};
use crate::store::{RunStore, StoreError, WorkflowStore};
use crate::workflow::{trigger_path_for, Ctx};

#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("Workflow trigger not found: {0}")]
    NotFound(String),

    #[error("Workflow is disabled: {0}")]
    Disabled(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Wait(#[from] WaitError),

    #[error("Failed to encode queue message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Synchronous answer to a trigger call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse {
    pub run_id: String,
    pub status: ExecutionStatus,
    pub error: Option<RunError>,
    pub ctx_final: Option<Ctx>,
    pub workflow_execution_steps: Option<Vec<TraceEntry>>,
}

impl From<RunResult> for TriggerResponse {
    fn from(result: RunResult) -> Self {
        Self {
            run_id: result.run_id,
            status: result.status,
            error: result.error,
            ctx_final: result.ctx_final,
            workflow_execution_steps: result.workflow_execution_steps,
        }
    }
}

/// How a triggered run gets executed
#[derive(Clone)]
pub enum Dispatch {
    /// Run in the trigger's own task
    Inline,
    /// Enqueue for a worker and wait on the correlation id
    Queued {
        queue: Arc<dyn RequestQueue>,
        waiter: RunWaiter,
        timeout: Duration,
    },
}

pub struct TriggerService {
    workflows: Arc<dyn WorkflowStore>,
    runs: Arc<dyn RunStore>,
    orchestrator: Arc<RunOrchestrator>,
    dispatch: Dispatch,
}

impl TriggerService {
    pub fn new(
        workflows: Arc<dyn WorkflowStore>,
        runs: Arc<dyn RunStore>,
        orchestrator: Arc<RunOrchestrator>,
        dispatch: Dispatch,
    ) -> Self {
        Self {
            workflows,
            runs,
            orchestrator,
            dispatch,
        }
    }

    /// Fire the workflow bound to `/t/<token>` with `input`.
    ///
    /// Lookup, storage and enqueue failures are errors. A run that
    /// executes (or times out while queued) is always an `Ok` response
    /// carrying its status.
    #[instrument(skip(self, input))]
    pub async fn trigger(&self, token: &str, input: Value) -> Result<TriggerResponse, TriggerError> {
        let trigger_path = trigger_path_for(token);

        let workflow = self
            .workflows
            .find_by_trigger_path(&trigger_path)
            .await?
            .ok_or_else(|| TriggerError::NotFound(trigger_path.clone()))?;

        if !workflow.enabled {
            warn!(workflow_id = %workflow.id, "Trigger for disabled workflow");
            return Err(TriggerError::Disabled(workflow.id));
        }

        let input = match input {
            Value::Null => Value::Object(Ctx::new()),
            other => other,
        };

        let run = self.runs.create_run(&workflow.id, input.clone()).await?;
        let request = RunRequest {
            correlation_id: uuid::Uuid::new_v4().to_string(),
            run_id: run.id.clone(),
            workflow_id: workflow.id.clone(),
            trigger_path,
            input,
        };

        info!(run_id = %run.id, workflow_id = %workflow.id, "Run created");

        match &self.dispatch {
            Dispatch::Inline => {
                let result = self.orchestrator.execute(&request).await?;
                Ok(result.into())
            }
            Dispatch::Queued {
                queue,
                waiter,
                timeout,
            } => {
                let pending = waiter.register(&request.correlation_id)?;
                let body = QueueEnvelope::RunRequest(request).encode()?;
                queue.send(body).await?;

                match pending.wait(*timeout).await {
                    Ok(result) => Ok(result.into()),
                    Err(e) => {
                        warn!(run_id = %run.id, error = %e, "No result for queued run");
                        Ok(TriggerResponse {
                            run_id: run.id,
                            status: ExecutionStatus::Failed,
                            error: Some(RunError::new(e.to_string())),
                            ctx_final: None,
                            workflow_execution_steps: None,
                        })
                    }
                }
            }
        }
    }
}
