//! Workflow types and definitions
//!
//! This module contains everything needed to describe a workflow before it
//! runs:
//! - `definition` - Stored workflow definition (id, trigger path, raw steps)
//! - `operation` - The canonical `Operation` enum and its parameters
//! - `normalize` - Raw step declarations (flat and legacy) to operations
//! - `operation_templates` - `{{op_name}}` references in transform steps
//! - `context` - Run context and secret resolution
//! - `dot_path` - Dot-path get/set/pick over the context
//! - `template` - `{{ path }}` string rendering
//! - `loader` - Load workflow definitions from files and directories
//! - `runner_config` - `runner.yaml` configuration

pub mod context;
pub mod definition;
pub mod dot_path;
pub mod loader;
pub mod normalize;
pub mod operation;
pub mod operation_templates;
pub mod runner_config;
pub mod template;

pub use context::{
    initial_ctx, input_to_ctx, Ctx, EnvSecrets, SecretChain, SecretResolver, StaticSecrets,
};
pub use definition::{trigger_path_for, WorkflowDefinition};
pub use loader::{LoadError, WorkflowLoader};
pub use normalize::{normalize_steps, StepError};
pub use operation::{
    BlockKind, Bracket, CompareOp, Condition, HttpBody, HttpMethod, HttpRequestStep, Operation,
};
pub use operation_templates::{
    expand_operation_templates, OperationTemplate, TemplateAttribute, TemplateError, Visibility,
};
pub use runner_config::{
    ConfigError, EngineConfig, HttpConfig, RunnerConfig, TriggerConfig, WorkerConfig,
};
