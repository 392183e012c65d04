//! Template rendering for `{{ dot.path }}` placeholders
//!
//! Placeholders are whitespace tolerant (`{{user.name}}` and
//! `{{ user.name }}` are the same) and resolve through [`dot_path::get`].
//! Unresolved placeholders render as the empty string.

use regex::{Captures, Regex};
use serde_json::{Map, Number, Value};
use std::sync::LazyLock;

use super::dot_path;

static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^}]+?)\s*\}\}").unwrap());

/// Replace every placeholder in `template` with its stringified value.
pub fn render(template: &str, ctx: &Map<String, Value>) -> String {
    PLACEHOLDER_REGEX
        .replace_all(template, |caps: &Captures| {
            dot_path::get(ctx, &caps[1])
                .map(stringify)
                .unwrap_or_default()
        })
        .into_owned()
}

/// Render every string found inside `value`, recursing through arrays and
/// objects. Non-string scalars are returned untouched.
pub fn deep_render(value: &Value, ctx: &Map<String, Value>) -> Value {
    match value {
        Value::String(s) => Value::String(render(s, ctx)),
        Value::Array(items) => Value::Array(items.iter().map(|v| deep_render(v, ctx)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), deep_render(v, ctx)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// String form of a context value as it appears inside rendered text.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(n),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Integral floats print without a fractional part (`3.0` renders as `3`).
pub fn format_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}
