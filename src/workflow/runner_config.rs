//! Runner configuration
//!
//! Loaded from `runner.yaml`. Every field has a default, so an empty file
//! (or no file at all) is a valid configuration:
//!
//! ```yaml
//! worker:
//!   enabled: true
//!   poll_wait_secs: 10
//!   visibility_timeout_secs: 30
//!   error_backoff_ms: 500
//!
//! trigger:
//!   sync_timeout_ms: 30000
//!
//! http:
//!   default_timeout_ms: 2000
//!   slack_timeout_ms: 10000
//!
//! engine:
//!   max_while_iterations: 100
//!
//! secrets:
//!   SLACK_WEBHOOK_URL: https://hooks.slack.com/services/T000/B000/XXXX
//! ```

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::LoadError;
use crate::bridge::worker::WorkerSettings;
use crate::engine::executor::EngineSettings;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Long-poll wait per receive, 1..=20 seconds
    #[serde(default = "default_poll_wait_secs")]
    pub poll_wait_secs: u64,

    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,

    /// Sleep after a queue transport error
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// How long a trigger waits for a queued run, 500..=60000 ms
    #[serde(default = "default_sync_timeout_ms")]
    pub sync_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_timeout_ms")]
    pub default_timeout_ms: u64,

    #[serde(default = "default_slack_timeout_ms")]
    pub slack_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_max_while_iterations")]
    pub max_while_iterations: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub trigger: TriggerConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    /// Names resolvable by `env:NAME` URLs
    #[serde(default)]
    pub secrets: HashMap<String, String>,
}

fn default_true() -> bool {
    true
}

fn default_poll_wait_secs() -> u64 {
    10
}

fn default_visibility_timeout_secs() -> u64 {
    30
}

fn default_error_backoff_ms() -> u64 {
    500
}

fn default_sync_timeout_ms() -> u64 {
    30_000
}

fn default_http_timeout_ms() -> u64 {
    2_000
}

fn default_slack_timeout_ms() -> u64 {
    10_000
}

fn default_max_while_iterations() -> u32 {
    100
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_wait_secs: default_poll_wait_secs(),
            visibility_timeout_secs: default_visibility_timeout_secs(),
            error_backoff_ms: default_error_backoff_ms(),
        }
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            sync_timeout_ms: default_sync_timeout_ms(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_http_timeout_ms(),
            slack_timeout_ms: default_slack_timeout_ms(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_while_iterations: default_max_while_iterations(),
        }
    }
}

impl RunnerConfig {
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(LoadError::from)?;
        let config: RunnerConfig =
            serde_yaml::from_str(&content).map_err(|e| LoadError::Yaml {
                file: path.display().to_string(),
                error: e,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("worker.poll_wait_secs", self.worker.poll_wait_secs, 1, 20)?;
        check_range(
            "worker.visibility_timeout_secs",
            self.worker.visibility_timeout_secs,
            1,
            43_200,
        )?;
        check_range(
            "trigger.sync_timeout_ms",
            self.trigger.sync_timeout_ms,
            500,
            60_000,
        )?;
        check_range(
            "http.default_timeout_ms",
            self.http.default_timeout_ms,
            1,
            30_000,
        )?;
        check_range("http.slack_timeout_ms", self.http.slack_timeout_ms, 1, 30_000)?;
        if self.engine.max_while_iterations == 0 {
            return Err(ConfigError::Invalid(
                "engine.max_while_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            max_while_iterations: self.engine.max_while_iterations,
            default_timeout: Duration::from_millis(self.http.default_timeout_ms),
            slack_timeout: Duration::from_millis(self.http.slack_timeout_ms),
        }
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            poll_wait: Duration::from_secs(self.worker.poll_wait_secs),
            error_backoff: Duration::from_millis(self.worker.error_backoff_ms),
        }
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.trigger.sync_timeout_ms)
    }
}

fn check_range(name: &str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{name} must be between {min} and {max}, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RunnerConfig::default();
        assert!(config.worker.enabled);
        assert_eq!(config.worker.poll_wait_secs, 10);
        assert_eq!(config.worker.error_backoff_ms, 500);
        assert_eq!(config.trigger.sync_timeout_ms, 30_000);
        assert_eq!(config.http.default_timeout_ms, 2_000);
        assert_eq!(config.http.slack_timeout_ms, 10_000);
        assert_eq!(config.engine.max_while_iterations, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_config() {
        let yaml = "worker:\n  enabled: false\n";
        let config: RunnerConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(!config.worker.enabled);
        assert_eq!(config.worker.poll_wait_secs, 10);
        assert_eq!(config.trigger.sync_timeout_ms, 30_000);
    }

    #[test]
    fn test_parse_secrets() {
        let yaml = r#"
secrets:
  SLACK_WEBHOOK_URL: https://hooks.slack.com/services/T/B/X
"#;
        let config: RunnerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.secrets.get("SLACK_WEBHOOK_URL").map(String::as_str),
            Some("https://hooks.slack.com/services/T/B/X")
        );
    }

    #[test]
    fn test_validate_ranges() {
        let mut config = RunnerConfig::default();
        config.worker.poll_wait_secs = 21;
        assert!(config.validate().is_err());

        let mut config = RunnerConfig::default();
        config.trigger.sync_timeout_ms = 100;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("trigger.sync_timeout_ms"));

        let mut config = RunnerConfig::default();
        config.engine.max_while_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_settings_conversion() {
        let config = RunnerConfig::default();
        let engine = config.engine_settings();
        assert_eq!(engine.max_while_iterations, 100);
        assert_eq!(engine.default_timeout, Duration::from_millis(2_000));
        let worker = config.worker_settings();
        assert_eq!(worker.poll_wait, Duration::from_secs(10));
        assert_eq!(worker.error_backoff, Duration::from_millis(500));
        assert_eq!(config.sync_timeout(), Duration::from_millis(30_000));
    }
}
