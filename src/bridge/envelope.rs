//! Queue message envelopes
//!
//! Requests and results travel as JSON tagged by `kind`:
//! `workflow_run_request` and `workflow_run_result`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::result::{EngineResult, ExecutionStatus, RunError, TraceEntry};
use crate::workflow::Ctx;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum QueueEnvelope {
    #[serde(rename = "workflow_run_request")]
    RunRequest(RunRequest),

    #[serde(rename = "workflow_run_result")]
    RunResult(RunResult),
}

impl QueueEnvelope {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }
}

/// Ask a worker to execute one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub correlation_id: String,
    pub run_id: String,
    pub workflow_id: String,
    pub trigger_path: String,
    #[serde(default)]
    pub input: Value,
}

/// Terminal outcome of one run, keyed by the request's correlation id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub correlation_id: String,
    pub run_id: String,
    pub workflow_id: String,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctx_final: Option<Ctx>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_execution_steps: Option<Vec<TraceEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    /// A failure that happened before the engine ran.
    pub fn failed(request: &RunRequest, error: RunError) -> Self {
        Self {
            correlation_id: request.correlation_id.clone(),
            run_id: request.run_id.clone(),
            workflow_id: request.workflow_id.clone(),
            status: ExecutionStatus::Failed,
            ctx_final: None,
            workflow_execution_steps: None,
            error: Some(error),
            finished_at: Utc::now(),
        }
    }

    pub fn from_engine(request: &RunRequest, result: EngineResult) -> Self {
        Self {
            correlation_id: request.correlation_id.clone(),
            run_id: request.run_id.clone(),
            workflow_id: request.workflow_id.clone(),
            status: result.status,
            ctx_final: Some(result.ctx),
            workflow_execution_steps: Some(result.trace.into_steps()),
            error: result.error,
            finished_at: Utc::now(),
        }
    }
}
