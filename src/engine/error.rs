//! Engine error types

use serde_json::Value;

use super::result::RunError;
use crate::workflow::{BlockKind, StepError};

/// Errors raised while compiling a step list. Nothing executes when one
/// of these is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    InvalidStep(#[from] StepError),

    #[error("Invalid workflow: {kind}.end must have an earlier matching {kind}.start")]
    UnmatchedEnd { kind: BlockKind, index: usize },

    #[error("Invalid workflow: {kind}.start must have a later matching {kind}.end")]
    UnclosedStart { kind: BlockKind, index: usize },
}

/// Runtime failures that end a run as `failed`
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("send.http_request requires a non-empty url")]
    EmptyUrl,

    #[error("send.http_request url references env:{0} but no value is configured for it")]
    UnresolvedSecret(String),

    #[error("{}", http_failure_message(.status))]
    HttpFailed { status: u16, details: Value },

    #[error("create_or_update requires numeric increment_by and default_value")]
    NonNumericOperands,

    #[error("create_or_update cannot increment non-numeric value at key '{0}'")]
    NonNumericValue(String),

    #[error("While loop exceeded max iterations ({0})")]
    LoopLimit(u32),

    #[error("Invalid workflow: {0} has no matching bracket")]
    MissingBracket(&'static str),
}

fn http_failure_message(status: &u16) -> String {
    if *status == 0 {
        "HTTP request failed (no response)".to_string()
    } else {
        format!("HTTP request failed with status {status}")
    }
}

impl From<EngineError> for RunError {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        match err {
            EngineError::HttpFailed { details, .. } => RunError::with_details(message, details),
            _ => RunError::new(message),
        }
    }
}

impl From<CompileError> for RunError {
    fn from(err: CompileError) -> Self {
        RunError::new(err.to_string())
    }
}
