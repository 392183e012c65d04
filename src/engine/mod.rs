//! Workflow execution engine module
//!
//! This module contains:
//! - `compiler` - Normalizes steps and matches if/while blocks
//! - `executor` - The instruction-pointer interpreter
//! - `compare` - Condition operators over JSON values
//! - `error` - Compile and runtime error types
//! - `result` - Run status, trace and result types
//! - `run` - Run orchestration (load, expand, execute, persist)
//! - `trigger` - Trigger path resolution and dispatch

pub mod compare;
pub mod compiler;
pub mod error;
pub mod executor;
pub mod result;
pub mod run;
pub mod trigger;

pub use compiler::{compile, BlockMap, CompiledWorkflow};
pub use error::{CompileError, EngineError};
pub use executor::{Engine, EngineSettings};
pub use result::{
    EngineResult, ExecutionStatus, ExecutionTrace, RunError, RunStatus, TraceEntry,
};
pub use run::RunOrchestrator;
pub use trigger::{Dispatch, TriggerError, TriggerResponse, TriggerService};
