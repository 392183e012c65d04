//! Canonical step operations
//!
//! Every accepted step shape is normalized onto [`Operation`], a closed
//! enum tagged by `action`. Dotted names (`filter.compare`) are canonical;
//! underscore spellings are accepted on input.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::dot_path::is_valid_path;

/// Comparison operators shared by `filter.compare`, `if.start` and `while.start`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Eq,
    #[serde(alias = "noteq")]
    Neq,
    Contains,
    Begins,
    Ends,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Contains => "contains",
            Self::Begins => "begins",
            Self::Ends => "ends",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `key <condition> value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub key: String,
    pub condition: CompareOp,
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    pub fn new(key: &str, condition: CompareOp, value: Value) -> Self {
        Self {
            key: key.to_string(),
            condition,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum HttpBody {
    /// The whole current context
    Ctx,
    /// A literal value, rendered through the template engine
    Custom {
        #[serde(default)]
        value: Value,
    },
}

impl HttpBody {
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Ctx => "ctx",
            Self::Custom { .. } => "custom",
        }
    }
}

pub const DEFAULT_WEBHOOK_URL: &str = "env:SLACK_WEBHOOK_URL";
pub const MAX_TIMEOUT_MS: u64 = 30_000;
pub const MAX_RETRIES: u32 = 10;

fn default_webhook_url() -> String {
    DEFAULT_WEBHOOK_URL.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestStep {
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default = "default_webhook_url")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<HttpBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
}

impl HttpRequestStep {
    pub fn new(method: HttpMethod, url: &str) -> Self {
        Self {
            method,
            url: url.to_string(),
            headers: None,
            body: None,
            timeout_ms: None,
            retries: None,
        }
    }
}

/// One executable step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Operation {
    #[serde(rename = "filter.compare", alias = "filter_compare")]
    FilterCompare(Condition),

    #[serde(rename = "transform.default_value", alias = "transform_default_value")]
    DefaultValue {
        key: String,
        #[serde(default)]
        value: Value,
    },

    #[serde(
        rename = "transform.replace_template",
        alias = "transform_replace_template"
    )]
    ReplaceTemplate { key: String, value: String },

    #[serde(rename = "transform.pick", alias = "transform_pick")]
    Pick { value: Vec<String> },

    #[serde(
        rename = "send.http_request",
        alias = "send_http_request",
        alias = "fetch.http_request"
    )]
    SendHttpRequest(HttpRequestStep),

    #[serde(rename = "if.start", alias = "if_start")]
    IfStart(Condition),

    #[serde(rename = "if.end", alias = "if_end")]
    IfEnd,

    #[serde(rename = "while.start", alias = "while_start")]
    WhileStart(Condition),

    #[serde(rename = "while.end", alias = "while_end")]
    WhileEnd,

    #[serde(rename = "create_or_update")]
    CreateOrUpdate {
        key: String,
        #[serde(default)]
        increment_by: Value,
        #[serde(default)]
        default_value: Value,
    },
}

/// Bracket kinds that form blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    If,
    While,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::If => f.write_str("if"),
            Self::While => f.write_str("while"),
        }
    }
}

/// Bracket role of an operation, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bracket {
    Start(BlockKind),
    End(BlockKind),
}

impl Operation {
    /// Canonical action name, as recorded in traces
    pub fn action_name(&self) -> &'static str {
        match self {
            Self::FilterCompare(_) => "filter.compare",
            Self::DefaultValue { .. } => "transform.default_value",
            Self::ReplaceTemplate { .. } => "transform.replace_template",
            Self::Pick { .. } => "transform.pick",
            Self::SendHttpRequest(_) => "send.http_request",
            Self::IfStart(_) => "if.start",
            Self::IfEnd => "if.end",
            Self::WhileStart(_) => "while.start",
            Self::WhileEnd => "while.end",
            Self::CreateOrUpdate { .. } => "create_or_update",
        }
    }

    pub fn bracket(&self) -> Option<Bracket> {
        match self {
            Self::IfStart(_) => Some(Bracket::Start(BlockKind::If)),
            Self::IfEnd => Some(Bracket::End(BlockKind::If)),
            Self::WhileStart(_) => Some(Bracket::Start(BlockKind::While)),
            Self::WhileEnd => Some(Bracket::End(BlockKind::While)),
            _ => None,
        }
    }

    /// Field-level checks that serde alone cannot express.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::FilterCompare(c) | Self::IfStart(c) | Self::WhileStart(c) => check_key(&c.key),
            Self::DefaultValue { key, .. }
            | Self::ReplaceTemplate { key, .. }
            | Self::CreateOrUpdate { key, .. } => check_key(key),
            Self::Pick { value } => {
                if value.is_empty() {
                    return Err("transform.pick requires at least one path".to_string());
                }
                value.iter().try_for_each(|p| check_key(p))
            }
            Self::SendHttpRequest(step) => {
                if let Some(timeout) = step.timeout_ms {
                    if !(1..=MAX_TIMEOUT_MS).contains(&timeout) {
                        return Err(format!(
                            "timeoutMs must be between 1 and {MAX_TIMEOUT_MS}, got {timeout}"
                        ));
                    }
                }
                if let Some(retries) = step.retries {
                    if retries > MAX_RETRIES {
                        return Err(format!(
                            "retries must be at most {MAX_RETRIES}, got {retries}"
                        ));
                    }
                }
                Ok(())
            }
            Self::IfEnd | Self::WhileEnd => Ok(()),
        }
    }
}

fn check_key(key: &str) -> Result<(), String> {
    if is_valid_path(key) {
        Ok(())
    } else {
        Err(format!("invalid dot path '{key}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_dotted_and_alias_names() {
        let op: Operation = serde_json::from_value(json!({
            "action": "filter_compare",
            "key": "status",
            "condition": "noteq",
            "value": "closed"
        }))
        .unwrap();
        assert_eq!(
            op,
            Operation::FilterCompare(Condition::new("status", CompareOp::Neq, json!("closed")))
        );
        assert_eq!(op.action_name(), "filter.compare");
    }

    #[test]
    fn test_serialize_uses_canonical_name() {
        let value = serde_json::to_value(Operation::IfEnd).unwrap();
        assert_eq!(value, json!({"action": "if.end"}));
    }

    #[test]
    fn test_http_step_defaults() {
        let op: Operation = serde_json::from_value(json!({
            "action": "fetch.http_request",
            "timeoutMs": 500
        }))
        .unwrap();
        let Operation::SendHttpRequest(step) = op else {
            panic!("expected http step");
        };
        assert_eq!(step.method, HttpMethod::Post);
        assert_eq!(step.url, DEFAULT_WEBHOOK_URL);
        assert_eq!(step.timeout_ms, Some(500));
        assert!(step.body.is_none());
    }

    #[test]
    fn test_http_body_modes() {
        let body: HttpBody = serde_json::from_value(json!({"mode": "ctx"})).unwrap();
        assert_eq!(body, HttpBody::Ctx);
        let body: HttpBody =
            serde_json::from_value(json!({"mode": "custom", "value": {"a": 1}})).unwrap();
        assert_eq!(body, HttpBody::Custom { value: json!({"a": 1}) });
    }

    #[test]
    fn test_unknown_method_rejected() {
        let result: Result<Operation, _> = serde_json::from_value(json!({
            "action": "send.http_request",
            "method": "TRACE",
            "url": "https://example.com"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_ranges() {
        let mut step = HttpRequestStep::new(HttpMethod::Get, "https://example.com");
        step.timeout_ms = Some(0);
        assert!(Operation::SendHttpRequest(step.clone()).validate().is_err());
        step.timeout_ms = Some(30_000);
        step.retries = Some(11);
        assert!(Operation::SendHttpRequest(step.clone()).validate().is_err());
        step.retries = Some(10);
        assert!(Operation::SendHttpRequest(step).validate().is_ok());
    }

    #[test]
    fn test_validate_paths() {
        assert!(Operation::Pick { value: vec![] }.validate().is_err());
        assert!(Operation::Pick {
            value: vec!["a.".to_string()]
        }
        .validate()
        .is_err());
        assert!(Operation::DefaultValue {
            key: "a.b".to_string(),
            value: json!(1)
        }
        .validate()
        .is_ok());
    }

    #[test]
    fn test_brackets() {
        assert_eq!(Operation::IfEnd.bracket(), Some(Bracket::End(BlockKind::If)));
        assert_eq!(
            Operation::Pick { value: vec![] }.bracket(),
            None
        );
    }
}
