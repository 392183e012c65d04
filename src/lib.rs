//! # Triggerflow
//!
//! A trigger-driven workflow engine. A workflow is an ordered list of
//! steps that transform a JSON context, branch with `if`/`while` blocks and
//! call out over HTTP. Runs are started through a trigger path and execute
//! either inline or through a request queue drained by a worker.
//!
//! ## Features
//!
//! - **Flat and legacy step shapes** - `{"action": ...}` steps alongside
//!   `filter`/`transform`/`http_request` groups
//! - **Block control flow** - `if.start`/`if.end` and bounded
//!   `while.start`/`while.end` loops
//! - **HTTP steps** - Per-attempt timeouts, exponential backoff, `env:`
//!   secret URLs
//! - **Execution trace** - One entry per evaluated step
//! - **Queue bridge** - Worker plus correlation-id waiter for synchronous
//!   triggers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use triggerflow::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = Engine::new(
//!         Arc::new(ReqwestTransport::new()?),
//!         Arc::new(EnvSecrets),
//!     );
//!
//!     let steps = vec![
//!         json!({"action": "filter.compare", "key": "amount", "condition": "gt", "value": 100}),
//!         json!({"action": "transform.default_value", "key": "tier", "value": "large"}),
//!     ];
//!
//!     let ctx = input_to_ctx(json!({"amount": 250}));
//!     let result = engine.run_steps(&steps, ctx).await;
//!
//!     println!("status={} tier={}", result.status, result.ctx["tier"]);
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod engine;
pub mod store;
pub mod workflow;

// Re-export main types
pub use bridge::{
    HttpTransport, MemoryQueue, QueueWorker, ReqwestTransport, RequestQueue, RunRequest, RunResult,
    RunWaiter,
};
pub use engine::{
    compile, CompileError, Dispatch, Engine, EngineError, EngineResult, EngineSettings,
    ExecutionStatus, ExecutionTrace, RunError, RunOrchestrator, RunStatus, TraceEntry,
    TriggerError, TriggerResponse, TriggerService,
};
pub use store::{
    MemoryOperationTemplateStore, MemoryRunStore, MemoryWorkflowStore, RunStore, StoreError,
    WorkflowStore,
};
pub use workflow::{
    Ctx, LoadError, Operation, RunnerConfig, SecretResolver, WorkflowDefinition, WorkflowLoader,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bridge::{
        HttpTransport, MemoryQueue, QueueWorker, ReqwestTransport, RequestQueue, RunHandler,
        RunWaiter, WorkerSettings,
    };
    pub use crate::engine::{
        Dispatch, Engine, EngineResult, EngineSettings, ExecutionStatus, RunOrchestrator,
        TriggerService,
    };
    pub use crate::store::{
        MemoryOperationTemplateStore, MemoryRunStore, MemoryWorkflowStore, RunStore, WorkflowStore,
    };
    pub use crate::workflow::{
        input_to_ctx, Ctx, EnvSecrets, RunnerConfig, SecretChain, StaticSecrets,
        WorkflowDefinition, WorkflowLoader,
    };
}
