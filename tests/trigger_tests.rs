mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use triggerflow::bridge::{HttpRequest, HttpTransport, TransportError, TransportResponse};
use triggerflow::engine::{RunStatus, TriggerError};
use triggerflow::prelude::*;
use triggerflow::workflow::{OperationTemplate, Visibility};

struct NoNetwork;

#[async_trait::async_trait]
impl HttpTransport for NoNetwork {
    async fn send(&self, _request: &HttpRequest) -> Result<TransportResponse, TransportError> {
        Err(TransportError::new("ConnectError", "network disabled"))
    }
}

struct Harness {
    workflows: Arc<MemoryWorkflowStore>,
    runs: Arc<MemoryRunStore>,
    templates: Arc<MemoryOperationTemplateStore>,
    engine: Arc<Engine>,
}

impl Harness {
    async fn new() -> Self {
        let workflows = Arc::new(MemoryWorkflowStore::new());
        workflows
            .insert(WorkflowDefinition::new(
                "orders",
                "Large orders",
                vec![
                    condition("filter.compare", "amount", "gte", json!(100)),
                    default_value("tier", json!("large")),
                ],
            ))
            .await;
        workflows
            .insert(
                WorkflowDefinition::new(
                    "counter",
                    "Counter",
                    vec![
                        condition("while.start", "n", "lt", json!(5)),
                        create_or_update("n", json!(1), json!(0)),
                        json!({"action": "while.end"}),
                    ],
                )
                .with_trigger_path("/t/count-token"),
            )
            .await;

        Self {
            workflows,
            runs: Arc::new(MemoryRunStore::new()),
            templates: Arc::new(MemoryOperationTemplateStore::new()),
            engine: Arc::new(engine_with(Arc::new(NoNetwork), StaticSecrets::new())),
        }
    }

    fn orchestrator(&self) -> RunOrchestrator {
        RunOrchestrator::new(
            Arc::clone(&self.engine),
            self.workflows.clone(),
            self.runs.clone(),
        )
        .with_templates(self.templates.clone())
    }

    fn inline(&self) -> TriggerService {
        TriggerService::new(
            self.workflows.clone(),
            self.runs.clone(),
            Arc::new(self.orchestrator()),
            Dispatch::Inline,
        )
    }

    async fn queued(&self, timeout: Duration) -> (TriggerService, QueueWorker) {
        let queue = Arc::new(MemoryQueue::new());
        let waiter = RunWaiter::new();
        let orchestrator = Arc::new(self.orchestrator().with_waiter(waiter.clone()));

        let worker = QueueWorker::new(queue.clone(), orchestrator.clone()).with_settings(
            WorkerSettings {
                poll_wait: Duration::from_millis(50),
                error_backoff: Duration::from_millis(10),
            },
        );
        worker.start().await;

        let service = TriggerService::new(
            self.workflows.clone(),
            self.runs.clone(),
            orchestrator,
            Dispatch::Queued {
                queue,
                waiter,
                timeout,
            },
        );
        (service, worker)
    }
}

#[tokio::test]
async fn test_inline_success_and_skip() {
    let harness = Harness::new().await;
    let service = harness.inline();

    let response = assert_ok!(service.trigger("orders", json!({"amount": 150})).await);
    assert_eq!(response.status, ExecutionStatus::Success);
    let ctx = response.ctx_final.unwrap();
    assert_eq!(ctx["tier"], json!("large"));
    assert_eq!(ctx["workflow_id"], json!("orders"));
    assert_eq!(ctx["run_id"], json!(response.run_id));

    let skipped = assert_ok!(service.trigger("orders", json!({"amount": 10})).await);
    assert_eq!(skipped.status, ExecutionStatus::Skipped);
    assert_eq!(skipped.workflow_execution_steps.unwrap().len(), 1);

    let runs = harness.runs.list_runs("orders").await;
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|r| r.status.is_terminal()));
}

#[tokio::test]
async fn test_custom_trigger_path() {
    let harness = Harness::new().await;
    let service = harness.inline();

    assert!(matches!(
        service.trigger("counter", json!({})).await,
        Err(TriggerError::NotFound(_))
    ));

    let response = assert_ok!(service.trigger("count-token", json!(null)).await);
    assert_eq!(response.status, ExecutionStatus::Success);
    assert_eq!(response.ctx_final.unwrap()["n"], json!(5));
}

#[tokio::test]
async fn test_disabled_workflow_rejected_without_run() {
    let harness = Harness::new().await;
    harness
        .workflows
        .insert(WorkflowDefinition::new("paused", "Paused", vec![]).disabled())
        .await;

    let err = assert_err!(harness.inline().trigger("paused", json!({})).await);
    assert_eq!(err.to_string(), "Workflow is disabled: paused");
    assert!(harness.runs.list_runs("paused").await.is_empty());
}

#[tokio::test]
async fn test_queued_run_through_worker() {
    let harness = Harness::new().await;
    let (service, worker) = harness.queued(Duration::from_secs(5)).await;

    let response = assert_ok!(service.trigger("orders", json!({"amount": 500})).await);
    worker.stop().await;

    assert_eq!(response.status, ExecutionStatus::Success);
    assert_eq!(response.ctx_final.unwrap()["tier"], json!("large"));

    let record = harness.runs.get_run(&response.run_id).await.unwrap().unwrap();
    assert_eq!(record.status, RunStatus::Success);
    assert!(record.finished_at.is_some());
}

#[tokio::test]
async fn test_concurrent_queued_triggers() {
    let harness = Harness::new().await;
    let (service, worker) = harness.queued(Duration::from_secs(10)).await;
    let service = Arc::new(service);

    let mut handles = Vec::new();
    for amount in [50, 100, 150, 200] {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            let response = service.trigger("orders", json!({"amount": amount})).await;
            (amount, response)
        }));
    }

    for handle in handles {
        let (amount, response) = handle.await.unwrap();
        let response = response.unwrap();
        let expected = if amount >= 100 {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Skipped
        };
        assert_eq!(response.status, expected, "amount {amount}");
        assert_eq!(response.ctx_final.unwrap()["amount"], json!(amount));
    }

    worker.stop().await;
}

#[tokio::test]
async fn test_queued_timeout_leaves_run_to_worker() {
    let harness = Harness::new().await;
    let queue = Arc::new(MemoryQueue::new());
    let service = TriggerService::new(
        harness.workflows.clone(),
        harness.runs.clone(),
        Arc::new(harness.orchestrator()),
        Dispatch::Queued {
            queue: queue.clone(),
            waiter: RunWaiter::new(),
            timeout: Duration::from_millis(50),
        },
    );

    let response = assert_ok!(service.trigger("orders", json!({"amount": 500})).await);
    assert_eq!(response.status, ExecutionStatus::Failed);
    assert_eq!(
        response.error.unwrap().message,
        "Timed out waiting for workflow result"
    );
    assert_eq!(queue.len(), 1);

    // A worker started later still completes the run
    let worker = QueueWorker::new(queue.clone(), Arc::new(harness.orchestrator()));
    assert_ok!(worker.poll_once().await);
    let record = harness.runs.get_run(&response.run_id).await.unwrap().unwrap();
    assert_eq!(record.status, RunStatus::Success);
}

#[tokio::test]
async fn test_operation_templates_visible_to_owner() {
    let harness = Harness::new().await;
    harness
        .templates
        .insert(
            OperationTemplate::new("stamp_line", "template", Visibility::Private)
                .created_by("team-a")
                .attr("to", "line")
                .attr("template", "order {{amount}}"),
        )
        .await;
    harness
        .workflows
        .insert(
            WorkflowDefinition::new(
                "stamped",
                "Stamped",
                vec![json!({"type": "transform", "ops": ["{{stamp_line}}"]})],
            )
            .with_owner("team-a"),
        )
        .await;
    harness
        .workflows
        .insert(
            WorkflowDefinition::new(
                "foreign",
                "Foreign",
                vec![json!({"type": "transform", "ops": ["{{stamp_line}}"]})],
            )
            .with_owner("team-b"),
        )
        .await;

    let service = harness.inline();

    let owned = assert_ok!(service.trigger("stamped", json!({"amount": 7})).await);
    assert_eq!(owned.ctx_final.unwrap()["line"], json!("order 7"));

    let foreign = assert_ok!(service.trigger("foreign", json!({"amount": 7})).await);
    assert_eq!(foreign.status, ExecutionStatus::Failed);
    assert_eq!(foreign.error.unwrap().message, "Invalid workflow steps");
}
