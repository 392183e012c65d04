#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;
use triggerflow::bridge::HttpTransport;
use triggerflow::prelude::*;

pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

pub fn write_workflow(dir: &Path, filename: &str, content: &str) {
    fs::write(dir.join(filename), content).expect("Failed to write workflow file");
}

pub fn write_runner_config(dir: &Path, content: &str) {
    fs::write(dir.join("runner.yaml"), content).expect("Failed to write runner.yaml");
}

pub fn simple_workflow(id: &str) -> String {
    format!(
        r#"
id: {id}
name: {id} workflow
steps:
  - action: transform.default_value
    key: greeting
    value: hello
"#
    )
}

pub fn filtered_workflow(id: &str) -> String {
    format!(
        r#"
id: {id}
name: {id} workflow
steps:
  - action: filter.compare
    key: amount
    condition: gt
    value: 100
  - action: transform.default_value
    key: tier
    value: large
"#
    )
}

pub fn counting_workflow(id: &str, limit: u32) -> String {
    format!(
        r#"
id: {id}
name: {id} workflow
steps:
  - action: transform.default_value
    key: counter
    value: 0
  - action: while.start
    key: counter
    condition: lt
    value: {limit}
  - action: create_or_update
    key: counter
    increment_by: 1
    default_value: 0
  - action: while.end
"#
    )
}

pub fn unbalanced_workflow(id: &str) -> String {
    format!(
        r#"
id: {id}
name: {id} workflow
steps:
  - action: if.start
    key: a
    condition: eq
    value: 1
"#
    )
}

pub fn condition(action: &str, key: &str, op: &str, value: Value) -> Value {
    json!({ "action": action, "key": key, "condition": op, "value": value })
}

pub fn default_value(key: &str, value: Value) -> Value {
    json!({ "action": "transform.default_value", "key": key, "value": value })
}

pub fn create_or_update(key: &str, increment_by: Value, default_value: Value) -> Value {
    json!({
        "action": "create_or_update",
        "key": key,
        "increment_by": increment_by,
        "default_value": default_value,
    })
}

pub fn ctx(value: Value) -> Ctx {
    input_to_ctx(value)
}

pub fn engine_with(transport: Arc<dyn HttpTransport>, secrets: StaticSecrets) -> Engine {
    Engine::new(transport, Arc::new(secrets))
}
