//! Reusable operation templates
//!
//! A grouped `transform` step may list `"{{op_name}}"` references among its
//! ops. Before compiling, each reference is looked up in an
//! [`OperationTemplateStore`] and replaced by the concrete op it describes.
//! Templates are visible when public or created by the workflow owner.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::store::{OperationTemplateStore, StoreError};

static OP_REF_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{\{\s*([a-zA-Z][a-zA-Z0-9_.-]{2,80})\s*\}\}$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateAttribute {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationTemplate {
    pub op: String,
    pub callback_type: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub attributes: Vec<TemplateAttribute>,
}

impl OperationTemplate {
    pub fn new(op: &str, callback_type: &str, visibility: Visibility) -> Self {
        Self {
            op: op.to_string(),
            callback_type: callback_type.to_string(),
            visibility,
            created_by: None,
            attributes: Vec::new(),
        }
    }

    pub fn created_by(mut self, owner: &str) -> Self {
        self.created_by = Some(owner.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.push(TemplateAttribute {
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    /// Public, or private and created by `owner`.
    pub fn is_visible_to(&self, owner: Option<&str>) -> bool {
        match self.visibility {
            Visibility::Public => true,
            Visibility::Private => owner.is_some() && self.created_by.as_deref() == owner,
        }
    }

    fn get_attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Invalid operation reference: {0}")]
    InvalidReference(String),

    #[error("Operation template not found or not visible: {}", .0.join(", "))]
    NotFound(Vec<String>),

    #[error("Operation {op} ({callback}) requires attributes: {required}")]
    MissingAttributes {
        op: String,
        callback: String,
        required: &'static str,
    },

    #[error("Operation {0} (pick) requires at least one path")]
    EmptyPaths(String),

    #[error("Unsupported callbackType for operation {op}: {callback}")]
    UnsupportedCallback { op: String, callback: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Extract the template name from a `{{ name }}` reference.
pub fn parse_op_ref(value: &str) -> Result<&str, TemplateError> {
    OP_REF_REGEX
        .captures(value)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| TemplateError::InvalidReference(value.to_string()))
}

/// Replace every template reference in grouped `transform` steps.
///
/// Steps without references are returned unchanged and the store is not
/// queried.
pub async fn expand_operation_templates(
    store: &dyn OperationTemplateStore,
    owner: Option<&str>,
    steps: &[Value],
) -> Result<Vec<Value>, TemplateError> {
    let mut referenced = BTreeSet::new();
    for ops in transform_ops(steps) {
        for op in ops {
            if let Value::String(reference) = op {
                referenced.insert(parse_op_ref(reference)?.to_string());
            }
        }
    }

    if referenced.is_empty() {
        return Ok(steps.to_vec());
    }

    let names: Vec<String> = referenced.into_iter().collect();
    debug!(templates = ?names, "Expanding operation templates");

    let found: HashMap<String, OperationTemplate> = store
        .find_visible(&names, owner)
        .await?
        .into_iter()
        .map(|t| (t.op.clone(), t))
        .collect();

    let missing: Vec<String> = names
        .iter()
        .filter(|n| !found.contains_key(*n))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(TemplateError::NotFound(missing));
    }

    let mut expanded_steps = Vec::with_capacity(steps.len());
    for step in steps {
        let Some(Value::Array(ops)) = transform_step_ops(step) else {
            expanded_steps.push(step.clone());
            continue;
        };

        let mut expanded_ops = Vec::with_capacity(ops.len());
        for op in ops {
            match op {
                Value::String(reference) => {
                    let name = parse_op_ref(reference)?;
                    let template = found
                        .get(name)
                        .ok_or_else(|| TemplateError::NotFound(vec![name.to_string()]))?;
                    expanded_ops.push(expand_one(template)?);
                }
                other => expanded_ops.push(other.clone()),
            }
        }

        let mut step = step.clone();
        if let Value::Object(map) = &mut step {
            map.insert("ops".to_string(), Value::Array(expanded_ops));
        }
        expanded_steps.push(step);
    }

    Ok(expanded_steps)
}

fn transform_step_ops(step: &Value) -> Option<&Value> {
    match step.get("type") {
        Some(Value::String(kind)) if kind == "transform" => step.get("ops"),
        _ => None,
    }
}

fn transform_ops<'a>(steps: &'a [Value]) -> impl Iterator<Item = &'a Vec<Value>> + 'a {
    steps.iter().filter_map(|step| match transform_step_ops(step) {
        Some(Value::Array(ops)) => Some(ops),
        _ => None,
    })
}

fn expand_one(template: &OperationTemplate) -> Result<Value, TemplateError> {
    let missing = |required: &'static str| TemplateError::MissingAttributes {
        op: template.op.clone(),
        callback: template.callback_type.clone(),
        required,
    };

    match template.callback_type.as_str() {
        "template" => {
            let to = template.get_attr("to").filter(|s| !s.is_empty());
            let body = template.get_attr("template").filter(|s| !s.is_empty());
            match (to, body) {
                (Some(to), Some(body)) => Ok(json!({"op": "template", "to": to, "template": body})),
                _ => Err(missing("to, template")),
            }
        }
        "default" => {
            let path = template.get_attr("path").filter(|s| !s.is_empty());
            let raw = template.get_attr("value");
            match (path, raw) {
                (Some(path), Some(raw)) => {
                    let value = serde_json::from_str::<Value>(raw)
                        .unwrap_or_else(|_| Value::String(raw.to_string()));
                    Ok(json!({"op": "default", "path": path, "value": value}))
                }
                _ => Err(missing("path, value")),
            }
        }
        "pick" => {
            let raw = template
                .get_attr("paths")
                .filter(|s| !s.is_empty())
                .ok_or_else(|| missing("paths"))?;
            let paths: Vec<&str> = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            if paths.is_empty() {
                return Err(TemplateError::EmptyPaths(template.op.clone()));
            }
            Ok(json!({"op": "pick", "paths": paths}))
        }
        other => Err(TemplateError::UnsupportedCallback {
            op: template.op.clone(),
            callback: other.to_string(),
        }),
    }
}
