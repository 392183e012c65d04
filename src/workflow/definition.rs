//! Workflow definitions

use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_enabled() -> bool {
    true
}

/// A stored workflow: identity, trigger binding and raw step declarations.
///
/// Steps stay as raw JSON until a run compiles them, so a definition with
/// broken steps can still be stored and listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: String,
    pub name: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Trigger path, `/t/<token>`. Defaults to `/t/<id>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,

    #[serde(default)]
    pub steps: Vec<Value>,
}

impl WorkflowDefinition {
    pub fn new(id: &str, name: &str, steps: Vec<Value>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            enabled: true,
            trigger_path: None,
            owner_id: None,
            steps,
        }
    }

    pub fn with_trigger_path(mut self, path: &str) -> Self {
        self.trigger_path = Some(path.to_string());
        self
    }

    pub fn with_owner(mut self, owner: &str) -> Self {
        self.owner_id = Some(owner.to_string());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn effective_trigger_path(&self) -> String {
        self.trigger_path
            .clone()
            .unwrap_or_else(|| trigger_path_for(&self.id))
    }
}

/// `/t/<token>`
pub fn trigger_path_for(token: &str) -> String {
    format!("/t/{}", token.trim_start_matches('/'))
}
