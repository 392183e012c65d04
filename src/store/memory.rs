//! In-memory stores

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{
    OperationTemplateStore, RunCompletion, RunRecord, RunStore, StoreError, WorkflowStore,
};
use crate::engine::result::RunStatus;
use crate::workflow::{OperationTemplate, WorkflowDefinition};

#[derive(Debug, Default)]
pub struct MemoryWorkflowStore {
    workflows: RwLock<HashMap<String, WorkflowDefinition>>,
}

impl MemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, workflow: WorkflowDefinition) {
        self.workflows
            .write()
            .await
            .insert(workflow.id.clone(), workflow);
    }

    pub async fn remove(&self, id: &str) -> Option<WorkflowDefinition> {
        self.workflows.write().await.remove(id)
    }

    pub async fn list(&self) -> Vec<WorkflowDefinition> {
        let mut workflows: Vec<_> = self.workflows.read().await.values().cloned().collect();
        workflows.sort_by(|a, b| a.id.cmp(&b.id));
        workflows
    }
}

#[async_trait]
impl WorkflowStore for MemoryWorkflowStore {
    async fn get(&self, id: &str) -> Result<Option<WorkflowDefinition>, StoreError> {
        Ok(self.workflows.read().await.get(id).cloned())
    }

    async fn find_by_trigger_path(
        &self,
        trigger_path: &str,
    ) -> Result<Option<WorkflowDefinition>, StoreError> {
        Ok(self
            .workflows
            .read()
            .await
            .values()
            .find(|w| w.effective_trigger_path() == trigger_path)
            .cloned())
    }
}

#[derive(Debug, Default)]
pub struct MemoryRunStore {
    runs: RwLock<HashMap<String, RunRecord>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs of `workflow_id`, oldest first
    pub async fn list_runs(&self, workflow_id: &str) -> Vec<RunRecord> {
        let mut runs: Vec<_> = self
            .runs
            .read()
            .await
            .values()
            .filter(|r| r.workflow_id == workflow_id)
            .cloned()
            .collect();
        runs.sort_by_key(|r| r.created_at);
        runs
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn create_run(&self, workflow_id: &str, input: Value) -> Result<RunRecord, StoreError> {
        let record = RunRecord {
            id: uuid::Uuid::new_v4().to_string(),
            workflow_id: workflow_id.to_string(),
            status: RunStatus::Running,
            input,
            ctx_final: None,
            execution_trace: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        };
        self.runs
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn complete_run(
        &self,
        run_id: &str,
        completion: RunCompletion,
    ) -> Result<RunRecord, StoreError> {
        let mut runs = self.runs.write().await;
        let record = runs
            .get_mut(run_id)
            .ok_or_else(|| StoreError::RunNotFound(run_id.to_string()))?;

        if record.status.is_terminal() {
            return Err(StoreError::AlreadyFinished(run_id.to_string()));
        }

        record.status = completion.status.into();
        record.ctx_final = completion.ctx_final;
        record.execution_trace = completion.execution_trace;
        record.error = completion.error;
        record.finished_at = Some(completion.finished_at);
        Ok(record.clone())
    }

    async fn get_run(&self, run_id: &str) -> Result<Option<RunRecord>, StoreError> {
        Ok(self.runs.read().await.get(run_id).cloned())
    }
}

#[derive(Debug, Default)]
pub struct MemoryOperationTemplateStore {
    templates: RwLock<Vec<OperationTemplate>>,
}

impl MemoryOperationTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, template: OperationTemplate) {
        self.templates.write().await.push(template);
    }
}

#[async_trait]
impl OperationTemplateStore for MemoryOperationTemplateStore {
    async fn find_visible(
        &self,
        ops: &[String],
        owner: Option<&str>,
    ) -> Result<Vec<OperationTemplate>, StoreError> {
        Ok(self
            .templates
            .read()
            .await
            .iter()
            .filter(|t| ops.contains(&t.op) && t.is_visible_to(owner))
            .cloned()
            .collect())
    }
}
