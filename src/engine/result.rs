//! Execution result types

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::workflow::Ctx;

/// Terminal outcome of one engine run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Skipped,
    Failed,
}

/// Lifecycle of a persisted run: `running` until mutated once to a
/// terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Skipped,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl From<ExecutionStatus> for RunStatus {
    fn from(status: ExecutionStatus) -> Self {
        match status {
            ExecutionStatus::Success => Self::Success,
            ExecutionStatus::Skipped => Self::Skipped,
            ExecutionStatus::Failed => Self::Failed,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Skipped => f.write_str("skipped"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Structured failure carried by a run: a message plus optional details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl RunError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(message: impl Into<String>, details: Value) -> Self {
        Self {
            message: message.into(),
            details: Some(details),
        }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// One executed operation: what ran, whether its condition passed, what it
/// saw, and a snapshot of the context right after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,
    pub details: Value,
    pub output: Ctx,
}

/// Append-only list of trace entries, in execution order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    #[serde(rename = "workflowExecutionSteps")]
    pub steps: Vec<TraceEntry>,
}

impl ExecutionTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: TraceEntry) {
        self.steps.push(entry);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TraceEntry> {
        self.steps.iter()
    }

    /// Entries recorded for `action`, in order
    pub fn entries_for<'a>(&'a self, action: &'a str) -> impl Iterator<Item = &'a TraceEntry> + 'a {
        self.steps.iter().filter(move |e| e.action == action)
    }

    pub fn into_steps(self) -> Vec<TraceEntry> {
        self.steps
    }
}

/// Result of interpreting one workflow
#[derive(Debug, Clone, PartialEq)]
pub struct EngineResult {
    pub status: ExecutionStatus,
    pub ctx: Ctx,
    pub trace: ExecutionTrace,
    pub error: Option<RunError>,
}

impl EngineResult {
    /// Failure before any operation executed: the context is returned
    /// untouched and the trace is empty.
    pub fn rejected(ctx: Ctx, error: RunError) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            ctx,
            trace: ExecutionTrace::new(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    pub fn is_skipped(&self) -> bool {
        self.status == ExecutionStatus::Skipped
    }

    pub fn is_failed(&self) -> bool {
        self.status == ExecutionStatus::Failed
    }
}
