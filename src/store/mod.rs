//! Persistence contracts
//!
//! Workflow definitions, run records and operation templates live behind
//! these traits. The engine never depends on a storage technology;
//! `memory` provides in-process implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::result::{ExecutionStatus, ExecutionTrace, RunError, RunStatus};
use crate::workflow::{Ctx, OperationTemplate, WorkflowDefinition};

pub mod memory;

pub use memory::{MemoryOperationTemplateStore, MemoryRunStore, MemoryWorkflowStore};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Run already finished: {0}")]
    AlreadyFinished(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// A persisted run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub id: String,
    pub workflow_id: String,
    pub status: RunStatus,
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctx_final: Option<Ctx>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_trace: Option<ExecutionTrace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// The single terminal write applied to a run
#[derive(Debug, Clone, PartialEq)]
pub struct RunCompletion {
    pub status: ExecutionStatus,
    pub ctx_final: Option<Ctx>,
    pub execution_trace: Option<ExecutionTrace>,
    pub error: Option<RunError>,
    pub finished_at: DateTime<Utc>,
}

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<WorkflowDefinition>, StoreError>;

    async fn find_by_trigger_path(
        &self,
        trigger_path: &str,
    ) -> Result<Option<WorkflowDefinition>, StoreError>;
}

#[async_trait]
pub trait RunStore: Send + Sync {
    /// Create a run in `running` state.
    async fn create_run(&self, workflow_id: &str, input: Value) -> Result<RunRecord, StoreError>;

    /// Move a `running` run to its terminal state. Fails with
    /// `AlreadyFinished` if the run is terminal already.
    async fn complete_run(
        &self,
        run_id: &str,
        completion: RunCompletion,
    ) -> Result<RunRecord, StoreError>;

    async fn get_run(&self, run_id: &str) -> Result<Option<RunRecord>, StoreError>;
}

#[async_trait]
pub trait OperationTemplateStore: Send + Sync {
    /// Templates named in `ops` that are public or created by `owner`.
    async fn find_visible(
        &self,
        ops: &[String],
        owner: Option<&str>,
    ) -> Result<Vec<OperationTemplate>, StoreError>;
}
