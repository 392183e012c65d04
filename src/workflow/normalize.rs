//! Step declaration normalization
//!
//! Accepted shapes:
//! - flat `{action: "<name>", ...}`
//! - flat `{type: "<name>", ...}` (same names, plus `fetch.http_request`)
//! - legacy `{type: "filter", conditions|ops: [{path, op, value}]}`
//! - legacy `{type: "transform", ops: [{op: default|template|pick, ...}]}`
//! - legacy `{type: "http_request", method, url, ...}`
//!
//! Legacy groups expand to one operation per entry, so the resulting list
//! can be longer than the declaration list.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::operation::{CompareOp, Condition, HttpRequestStep, Operation};

/// A declaration that could not be turned into operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid step at index {index}: {message}")]
pub struct StepError {
    pub index: usize,
    pub message: String,
}

impl StepError {
    fn new(index: usize, message: impl Into<String>) -> Self {
        Self {
            index,
            message: message.into(),
        }
    }
}

#[derive(Deserialize)]
struct LegacyFilter {
    #[serde(default)]
    conditions: Option<Vec<LegacyCondition>>,
    #[serde(default)]
    ops: Option<Vec<LegacyCondition>>,
}

#[derive(Deserialize)]
struct LegacyCondition {
    path: String,
    op: CompareOp,
    #[serde(default)]
    value: Value,
}

#[derive(Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum LegacyTransformOp {
    Default {
        path: String,
        #[serde(default)]
        value: Value,
    },
    Template {
        to: String,
        template: String,
    },
    Pick {
        paths: Vec<String>,
    },
}

/// Normalize raw step declarations and validate every resulting operation.
pub fn normalize_steps(steps: &[Value]) -> Result<Vec<Operation>, StepError> {
    let mut operations = Vec::with_capacity(steps.len());

    for (index, raw) in steps.iter().enumerate() {
        let Value::Object(step) = raw else {
            return Err(StepError::new(index, "step must be an object"));
        };

        let expanded = normalize_step(index, step)?;
        for op in &expanded {
            op.validate()
                .map_err(|message| StepError::new(index, format!("{}: {message}", op.action_name())))?;
        }
        operations.extend(expanded);
    }

    Ok(operations)
}

fn normalize_step(index: usize, step: &Map<String, Value>) -> Result<Vec<Operation>, StepError> {
    if let Some(Value::String(_)) = step.get("action") {
        return parse_flat(index, Value::Object(step.clone())).map(|op| vec![op]);
    }

    let Some(Value::String(kind)) = step.get("type") else {
        return Err(StepError::new(
            index,
            "step must declare a string `action` or `type`",
        ));
    };

    match kind.as_str() {
        "filter" => normalize_filter(index, step),
        "transform" => normalize_transform(index, step),
        "http_request" => normalize_http(index, step).map(|op| vec![op]),
        _ => {
            let mut flat = step.clone();
            flat.insert("action".to_string(), Value::String(kind.clone()));
            parse_flat(index, Value::Object(flat)).map(|op| vec![op])
        }
    }
}

fn parse_flat(index: usize, step: Value) -> Result<Operation, StepError> {
    serde_json::from_value(step).map_err(|e| StepError::new(index, e.to_string()))
}

fn normalize_filter(index: usize, step: &Map<String, Value>) -> Result<Vec<Operation>, StepError> {
    let filter: LegacyFilter = serde_json::from_value(Value::Object(step.clone()))
        .map_err(|e| StepError::new(index, e.to_string()))?;

    let conditions = filter.conditions.or(filter.ops).unwrap_or_default();
    if conditions.is_empty() {
        return Err(StepError::new(
            index,
            "filter step requires at least one condition",
        ));
    }

    Ok(conditions
        .into_iter()
        .map(|c| Operation::FilterCompare(Condition::new(&c.path, c.op, c.value)))
        .collect())
}

fn normalize_transform(
    index: usize,
    step: &Map<String, Value>,
) -> Result<Vec<Operation>, StepError> {
    let Some(Value::Array(ops)) = step.get("ops") else {
        return Err(StepError::new(index, "transform step requires an `ops` array"));
    };
    if ops.is_empty() {
        return Err(StepError::new(index, "transform step requires at least one op"));
    }

    ops.iter()
        .map(|raw| {
            if let Value::String(reference) = raw {
                return Err(StepError::new(
                    index,
                    format!("unresolved operation reference '{reference}'"),
                ));
            }
            let op: LegacyTransformOp = serde_json::from_value(raw.clone())
                .map_err(|e| StepError::new(index, e.to_string()))?;
            Ok(match op {
                LegacyTransformOp::Default { path, value } => {
                    Operation::DefaultValue { key: path, value }
                }
                LegacyTransformOp::Template { to, template } => Operation::ReplaceTemplate {
                    key: to,
                    value: template,
                },
                LegacyTransformOp::Pick { paths } => Operation::Pick { value: paths },
            })
        })
        .collect()
}

fn normalize_http(index: usize, step: &Map<String, Value>) -> Result<Operation, StepError> {
    if !matches!(step.get("url"), Some(Value::String(_))) {
        return Err(StepError::new(index, "http_request step requires a `url`"));
    }
    let http: HttpRequestStep = serde_json::from_value(Value::Object(step.clone()))
        .map_err(|e| StepError::new(index, e.to_string()))?;
    Ok(Operation::SendHttpRequest(http))
}
