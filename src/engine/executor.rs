//! Workflow interpreter
//!
//! Executes a compiled operation list against a context. Control flow is
//! an instruction pointer over the list: `if.start` / `while.start` jump
//! past their block using the compiler's block map, `while.end` jumps back
//! to its start. Every executed operation appends a trace entry holding a
//! snapshot of the context.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use super::compare::{evaluate, number_value, to_number_like};
use super::compiler::{compile, CompiledWorkflow};
use super::error::EngineError;
use super::result::{EngineResult, ExecutionStatus, ExecutionTrace, RunError, TraceEntry};
use crate::bridge::web::{
    execute_http_request, is_slack_webhook_url, parse_response_body, HttpRequest, HttpTransport,
};
use crate::workflow::{
    dot_path, template, Condition, Ctx, HttpBody, HttpRequestStep, Operation, SecretResolver,
};

/// Tunables for the interpreter
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// A `while` block fails once its counter reaches this value
    pub max_while_iterations: u32,
    /// HTTP timeout when a step sets none
    pub default_timeout: Duration,
    /// HTTP timeout for Slack incoming webhooks when a step sets none
    pub slack_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_while_iterations: 100,
            default_timeout: Duration::from_millis(2_000),
            slack_timeout: Duration::from_millis(10_000),
        }
    }
}

enum Flow {
    Next,
    Jump(usize),
    Stop,
}

struct RunState {
    ctx: Ctx,
    trace: ExecutionTrace,
    while_iterations: HashMap<usize, u32>,
}

impl RunState {
    fn new(ctx: Ctx) -> Self {
        Self {
            ctx,
            trace: ExecutionTrace::new(),
            while_iterations: HashMap::new(),
        }
    }

    fn record(&mut self, action: &str, passed: Option<bool>, details: Value) {
        self.trace.push(TraceEntry {
            action: action.to_string(),
            passed,
            details,
            output: self.ctx.clone(),
        });
    }

    fn finish(self, status: ExecutionStatus, error: Option<RunError>) -> EngineResult {
        EngineResult {
            status,
            ctx: self.ctx,
            trace: self.trace,
            error,
        }
    }
}

pub struct Engine {
    transport: Arc<dyn HttpTransport>,
    secrets: Arc<dyn SecretResolver>,
    settings: EngineSettings,
}

impl Engine {
    pub fn new(transport: Arc<dyn HttpTransport>, secrets: Arc<dyn SecretResolver>) -> Self {
        Self {
            transport,
            secrets,
            settings: EngineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Compile `steps` and run them. A compile failure yields a `failed`
    /// result with an empty trace.
    #[instrument(skip_all, fields(steps = steps.len()))]
    pub async fn run_steps(&self, steps: &[Value], ctx: Ctx) -> EngineResult {
        match compile(steps) {
            Ok(workflow) => self.run(&workflow, ctx).await,
            Err(e) => {
                warn!(error = %e, "Workflow rejected before execution");
                EngineResult::rejected(ctx, e.into())
            }
        }
    }

    #[instrument(skip_all, fields(operations = workflow.len()))]
    pub async fn run(&self, workflow: &CompiledWorkflow, ctx: Ctx) -> EngineResult {
        let mut state = RunState::new(ctx);
        let mut ip = 0;

        while let Some(op) = workflow.operations.get(ip) {
            debug!(index = ip, action = op.action_name(), "Executing operation");

            match self.execute_operation(workflow, ip, op, &mut state).await {
                Ok(Flow::Next) => ip += 1,
                Ok(Flow::Jump(target)) => ip = target,
                Ok(Flow::Stop) => {
                    info!(index = ip, "Filter did not pass, workflow skipped");
                    return state.finish(ExecutionStatus::Skipped, None);
                }
                Err(e) => {
                    warn!(index = ip, action = op.action_name(), error = %e, "Workflow failed");
                    return state.finish(ExecutionStatus::Failed, Some(e.into()));
                }
            }
        }

        info!(steps = state.trace.len(), "Workflow completed");
        state.finish(ExecutionStatus::Success, None)
    }

    async fn execute_operation(
        &self,
        workflow: &CompiledWorkflow,
        ip: usize,
        op: &Operation,
        state: &mut RunState,
    ) -> Result<Flow, EngineError> {
        let action = op.action_name();

        match op {
            Operation::FilterCompare(condition) => {
                let (passed, details) = check(condition, &state.ctx, None);
                state.record(action, Some(passed), details);
                Ok(if passed { Flow::Next } else { Flow::Stop })
            }

            Operation::DefaultValue { key, value } => {
                let is_empty = match dot_path::get(&state.ctx, key) {
                    None => true,
                    Some(Value::String(s)) => s.is_empty(),
                    Some(_) => false,
                };
                if is_empty {
                    dot_path::set(&mut state.ctx, key, value.clone());
                }
                state.record(action, None, json!({ "key": key }));
                Ok(Flow::Next)
            }

            Operation::ReplaceTemplate { key, value } => {
                let rendered = template::render(value, &state.ctx);
                dot_path::set(&mut state.ctx, key, Value::String(rendered));
                state.record(action, None, json!({ "key": key }));
                Ok(Flow::Next)
            }

            Operation::Pick { value } => {
                state.ctx = dot_path::pick(&state.ctx, value);
                state.record(action, None, json!({ "keys": value }));
                Ok(Flow::Next)
            }

            Operation::SendHttpRequest(step) => self.send_http(step, state).await,

            Operation::IfStart(condition) => {
                let (passed, details) = check(condition, &state.ctx, None);
                state.record(action, Some(passed), details);
                if passed {
                    return Ok(Flow::Next);
                }
                let end = workflow
                    .blocks
                    .end_of(ip)
                    .ok_or(EngineError::MissingBracket("if.start"))?;
                Ok(Flow::Jump(end + 1))
            }

            Operation::IfEnd => {
                state.record(action, None, json!({}));
                Ok(Flow::Next)
            }

            Operation::WhileStart(condition) => {
                let iteration = state.while_iterations.get(&ip).copied().unwrap_or(0);
                let (passed, details) = check(condition, &state.ctx, Some(iteration));
                state.record(action, Some(passed), details);
                if passed {
                    return Ok(Flow::Next);
                }
                let end = workflow
                    .blocks
                    .end_of(ip)
                    .ok_or(EngineError::MissingBracket("while.start"))?;
                state.while_iterations.remove(&ip);
                Ok(Flow::Jump(end + 1))
            }

            Operation::WhileEnd => {
                let start = workflow
                    .blocks
                    .start_of(ip)
                    .ok_or(EngineError::MissingBracket("while.end"))?;
                let counter = state.while_iterations.entry(start).or_insert(0);
                *counter += 1;
                let iteration = *counter;
                state.record(action, None, json!({ "iteration": iteration }));

                if iteration >= self.settings.max_while_iterations {
                    return Err(EngineError::LoopLimit(self.settings.max_while_iterations));
                }
                Ok(Flow::Jump(start))
            }

            Operation::CreateOrUpdate {
                key,
                increment_by,
                default_value,
            } => {
                let (Some(increment), Some(default)) =
                    (to_number_like(increment_by), to_number_like(default_value))
                else {
                    return Err(EngineError::NonNumericOperands);
                };

                let before = match dot_path::get(&state.ctx, key).map(to_number_like) {
                    None => {
                        dot_path::set(&mut state.ctx, key, number_value(default));
                        state.record(
                            action,
                            None,
                            json!({
                                "key": key,
                                "created": true,
                                "default_value": number_value(default),
                            }),
                        );
                        return Ok(Flow::Next);
                    }
                    Some(None) => return Err(EngineError::NonNumericValue(key.clone())),
                    Some(Some(before)) => before,
                };

                let after = before + increment;
                dot_path::set(&mut state.ctx, key, number_value(after));
                state.record(
                    action,
                    None,
                    json!({
                        "key": key,
                        "created": false,
                        "before": number_value(before),
                        "increment_by": number_value(increment),
                        "after": number_value(after),
                    }),
                );
                Ok(Flow::Next)
            }
        }
    }

    async fn send_http(
        &self,
        step: &HttpRequestStep,
        state: &mut RunState,
    ) -> Result<Flow, EngineError> {
        const ACTION: &str = "send.http_request";

        let headers: Option<BTreeMap<String, String>> = step.headers.as_ref().map(|headers| {
            headers
                .iter()
                .map(|(name, value)| (name.clone(), template::render(value, &state.ctx)))
                .collect()
        });

        let url = match self.resolve_url(&step.url) {
            Ok(url) => url,
            Err(e) => {
                state.record(ACTION, None, json!({ "error": e.to_string() }));
                return Err(e);
            }
        };

        let body = step.body.as_ref().map(|body| match body {
            HttpBody::Ctx => Value::Object(state.ctx.clone()),
            HttpBody::Custom { value } => template::deep_render(value, &state.ctx),
        });

        let timeout = step
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.default_timeout_for(&url));

        let request = HttpRequest {
            method: step.method,
            url,
            headers: headers.clone().unwrap_or_default(),
            body,
            timeout,
            retries: step.retries.unwrap_or(0),
        };

        let result = execute_http_request(self.transport.as_ref(), &request).await;

        state
            .ctx
            .insert("send_http_status".to_string(), json!(result.status));
        state.ctx.insert("send_http_ok".to_string(), json!(result.ok));
        state.ctx.insert(
            "send_http_response".to_string(),
            parse_response_body(&result.body_text),
        );
        state.ctx.insert(
            "send_http_retries_used".to_string(),
            json!(result.retries_used),
        );

        state.record(
            ACTION,
            None,
            json!({
                "request": {
                    "method": step.method,
                    "url": request.url,
                    "headers": headers,
                    "bodyMode": step.body.as_ref().map(HttpBody::mode),
                },
                "response": {
                    "ok": result.ok,
                    "status": result.status,
                    "bodyText": result.body_text,
                    "attempts": result.attempts,
                    "retriesUsed": result.retries_used,
                    "error": result.error,
                },
            }),
        );

        if !result.ok {
            return Err(EngineError::HttpFailed {
                status: result.status,
                details: json!({
                    "status": result.status,
                    "bodyText": result.body_text,
                    "attempts": result.attempts,
                    "retriesUsed": result.retries_used,
                    "error": result.error,
                }),
            });
        }

        Ok(Flow::Next)
    }

    /// Trim the URL and resolve an `env:NAME` indirection.
    fn resolve_url(&self, raw: &str) -> Result<String, EngineError> {
        let url = raw.trim();
        if url.is_empty() {
            return Err(EngineError::EmptyUrl);
        }

        let Some(name) = url.strip_prefix("env:") else {
            return Ok(url.to_string());
        };

        let name = name.trim();
        self.secrets
            .resolve(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| EngineError::UnresolvedSecret(name.to_string()))
    }

    fn default_timeout_for(&self, url: &str) -> Duration {
        if is_slack_webhook_url(url) {
            self.settings.slack_timeout
        } else {
            self.settings.default_timeout
        }
    }
}

/// Evaluate a condition and build its trace details.
fn check(condition: &Condition, ctx: &Ctx, iteration: Option<u32>) -> (bool, Value) {
    let actual = dot_path::get_or_null(ctx, &condition.key);
    let passed = evaluate(&actual, condition.condition, &condition.value);

    let mut details = json!({
        "key": condition.key,
        "condition": condition.condition,
        "expected": condition.value,
        "actual": actual,
    });
    if let (Some(iteration), Value::Object(map)) = (iteration, &mut details) {
        map.insert("iteration".to_string(), json!(iteration));
    }

    (passed, details)
}
