//! Run context and secret resolution
//!
//! A run's context (`Ctx`) is a plain JSON object owned by exactly one
//! in-flight run. Secrets never live in the context; `env:NAME` URLs are
//! resolved through a [`SecretResolver`] handed to the engine.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

/// The mutable JSON object every step reads and writes.
pub type Ctx = Map<String, Value>;

/// Turn trigger input into a context: objects are used as-is, anything
/// else is wrapped as `{ "payload": <input> }`.
pub fn input_to_ctx(input: Value) -> Ctx {
    match input {
        Value::Object(map) => map,
        other => {
            let mut ctx = Map::new();
            ctx.insert("payload".to_string(), other);
            ctx
        }
    }
}

/// Initial context for a run: the wrapped input plus `workflow_id` and
/// `run_id`, which override same-named input keys.
pub fn initial_ctx(input: Value, workflow_id: &str, run_id: &str) -> Ctx {
    let mut ctx = input_to_ctx(input);
    ctx.insert(
        "workflow_id".to_string(),
        Value::String(workflow_id.to_string()),
    );
    ctx.insert("run_id".to_string(), Value::String(run_id.to_string()));
    ctx
}

/// Resolves secret names referenced by `env:NAME` URLs
pub trait SecretResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<String>;
}

/// Fixed name → value map (config files, tests)
#[derive(Debug, Clone, Default)]
pub struct StaticSecrets {
    secrets: HashMap<String, String>,
}

impl StaticSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        self.secrets.insert(name.to_string(), value.to_string());
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

impl From<HashMap<String, String>> for StaticSecrets {
    fn from(secrets: HashMap<String, String>) -> Self {
        Self { secrets }
    }
}

impl SecretResolver for StaticSecrets {
    fn resolve(&self, name: &str) -> Option<String> {
        self.secrets.get(name).cloned()
    }
}

/// Reads secrets from the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecrets;

impl SecretResolver for EnvSecrets {
    fn resolve(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Tries each resolver in order; the first non-empty answer wins.
#[derive(Clone, Default)]
pub struct SecretChain {
    resolvers: Vec<Arc<dyn SecretResolver>>,
}

impl SecretChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, resolver: Arc<dyn SecretResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }
}

impl SecretResolver for SecretChain {
    fn resolve(&self, name: &str) -> Option<String> {
        self.resolvers
            .iter()
            .filter_map(|r| r.resolve(name))
            .find(|v| !v.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_input_object_kept() {
        let ctx = input_to_ctx(json!({"a": 1}));
        assert_eq!(Value::Object(ctx), json!({"a": 1}));
    }

    #[test]
    fn test_input_scalar_wrapped() {
        let ctx = input_to_ctx(json!([1, 2]));
        assert_eq!(Value::Object(ctx), json!({"payload": [1, 2]}));
    }

    #[test]
    fn test_initial_ctx_overrides_ids() {
        let ctx = initial_ctx(json!({"run_id": "spoofed", "x": 1}), "wf-1", "run-1");
        assert_eq!(
            Value::Object(ctx),
            json!({"x": 1, "workflow_id": "wf-1", "run_id": "run-1"})
        );
    }

    #[test]
    fn test_static_secrets() {
        let secrets = StaticSecrets::new().with("HOOK", "https://example.com");
        assert_eq!(secrets.resolve("HOOK").as_deref(), Some("https://example.com"));
        assert_eq!(secrets.resolve("OTHER"), None);
        assert_eq!(secrets.len(), 1);
    }

    #[test]
    fn test_secret_chain_skips_blank_values() {
        let chain = SecretChain::new()
            .push(Arc::new(StaticSecrets::new().with("A", "  ")))
            .push(Arc::new(StaticSecrets::new().with("A", "second")));
        assert_eq!(chain.resolve("A").as_deref(), Some("second"));
        assert_eq!(chain.resolve("B"), None);
    }
}
