//! Run orchestration
//!
//! load workflow → expand operation templates → build initial context →
//! compile + interpret → persist the terminal state → deliver the result.
//!
//! Every request that reaches [`RunOrchestrator::execute`] ends with exactly
//! one terminal write to the run store, whatever went wrong before it.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info, instrument, warn};

use super::executor::Engine;
use super::result::{EngineResult, RunError};
use crate::bridge::envelope::{RunRequest, RunResult};
use crate::bridge::waiter::RunWaiter;
use crate::bridge::worker::RunHandler;
use crate::store::{OperationTemplateStore, RunCompletion, RunStore, StoreError, WorkflowStore};
use crate::workflow::{expand_operation_templates, initial_ctx, normalize_steps, Ctx};

pub struct RunOrchestrator {
    engine: Arc<Engine>,
    workflows: Arc<dyn WorkflowStore>,
    runs: Arc<dyn RunStore>,
    templates: Option<Arc<dyn OperationTemplateStore>>,
    waiter: Option<RunWaiter>,
}

impl RunOrchestrator {
    pub fn new(
        engine: Arc<Engine>,
        workflows: Arc<dyn WorkflowStore>,
        runs: Arc<dyn RunStore>,
    ) -> Self {
        Self {
            engine,
            workflows,
            runs,
            templates: None,
            waiter: None,
        }
    }

    pub fn with_templates(mut self, templates: Arc<dyn OperationTemplateStore>) -> Self {
        self.templates = Some(templates);
        self
    }

    /// Results handled through [`RunHandler`] are also delivered to
    /// `waiter`.
    pub fn with_waiter(mut self, waiter: RunWaiter) -> Self {
        self.waiter = Some(waiter);
        self
    }

    /// Execute one run request and persist its terminal state.
    ///
    /// Only storage failures are returned as errors; every workflow-level
    /// problem becomes a `failed` result.
    #[instrument(skip_all, fields(run_id = %request.run_id, workflow_id = %request.workflow_id))]
    pub async fn execute(&self, request: &RunRequest) -> Result<RunResult, StoreError> {
        let Some(workflow) = self.workflows.get(&request.workflow_id).await? else {
            warn!("Workflow not found");
            let error = RunError::new("Workflow not found");
            return self
                .persist(request, EngineResult::rejected(Ctx::new(), error))
                .await;
        };

        let ctx = initial_ctx(request.input.clone(), &workflow.id, &request.run_id);

        let steps = match &self.templates {
            Some(templates) => {
                match expand_operation_templates(
                    templates.as_ref(),
                    workflow.owner_id.as_deref(),
                    &workflow.steps,
                )
                .await
                {
                    Ok(steps) => steps,
                    Err(e) => {
                        warn!(error = %e, "Invalid workflow steps");
                        let error = RunError::with_details(
                            "Invalid workflow steps",
                            serde_json::Value::String(e.to_string()),
                        );
                        return self
                            .persist(request, EngineResult::rejected(ctx, error))
                            .await;
                    }
                }
            }
            None => workflow.steps.clone(),
        };

        // Block balance is reported by the engine itself; malformed steps stop here
        if let Err(e) = normalize_steps(&steps) {
            warn!(error = %e, "Invalid workflow steps");
            let error = RunError::with_details(
                "Invalid workflow steps",
                serde_json::Value::String(e.to_string()),
            );
            return self
                .persist(request, EngineResult::rejected(ctx, error))
                .await;
        }

        info!(name = %workflow.name, steps = steps.len(), "Executing workflow run");

        let engine = Arc::clone(&self.engine);
        let fallback_ctx = ctx.clone();
        let outcome = tokio::spawn(async move { engine.run_steps(&steps, ctx).await }).await;

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Workflow execution aborted");
                EngineResult::rejected(
                    fallback_ctx,
                    RunError::with_details(
                        "Workflow execution aborted",
                        serde_json::Value::String(e.to_string()),
                    ),
                )
            }
        };

        self.persist(request, result).await
    }

    async fn persist(
        &self,
        request: &RunRequest,
        result: EngineResult,
    ) -> Result<RunResult, StoreError> {
        let finished_at = Utc::now();
        let completion = RunCompletion {
            status: result.status,
            ctx_final: Some(result.ctx.clone()),
            execution_trace: Some(result.trace.clone()),
            error: result.error.clone(),
            finished_at,
        };
        self.runs.complete_run(&request.run_id, completion).await?;

        let mut run_result = RunResult::from_engine(request, result);
        run_result.finished_at = finished_at;
        info!(status = %run_result.status, "Run finished");
        Ok(run_result)
    }
}

#[async_trait]
impl RunHandler for RunOrchestrator {
    async fn handle(&self, request: RunRequest) -> Result<RunResult, StoreError> {
        let outcome = self.execute(&request).await;

        if let Some(waiter) = &self.waiter {
            match &outcome {
                Ok(result) => {
                    waiter.resolve(&request.correlation_id, result.clone());
                }
                Err(e) => {
                    waiter.reject(&request.correlation_id, e.to_string());
                }
            }
        }

        outcome
    }
}
