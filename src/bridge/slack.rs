//! Slack webhook test send
//!
//! Posts a plain `{"text": ...}` message to a Slack incoming webhook so a
//! configured `env:NAME` URL can be checked before a workflow depends on it.

use std::time::Duration;

use serde::Serialize;
use tracing::{info, instrument};

use super::web::{
    execute_http_request, is_slack_webhook_url, HttpRequest, HttpResult, HttpTransport,
};
use crate::workflow::operation::DEFAULT_WEBHOOK_URL;
use crate::workflow::{HttpMethod, SecretResolver};

const MAX_TEXT_CHARS: usize = 2_000;
const MIN_TIMEOUT_MS: u64 = 100;
const MAX_TIMEOUT_MS: u64 = 30_000;
const MAX_RETRIES: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlackTestError {
    #[error("text must be between 1 and {MAX_TEXT_CHARS} characters")]
    InvalidText,

    #[error("timeout must be between {MIN_TIMEOUT_MS} and {MAX_TIMEOUT_MS} ms")]
    InvalidTimeout,

    #[error("retries must be at most {MAX_RETRIES}")]
    InvalidRetries,

    #[error("Invalid Slack webhook url")]
    InvalidUrl,

    #[error("Missing or empty env var: {0}")]
    MissingEnv(String),

    #[error("Resolved url is not a valid Slack webhook url")]
    ResolvedNotSlack,
}

/// A test message to send
#[derive(Debug, Clone)]
pub struct SlackTestMessage {
    /// Webhook URL or `env:NAME`
    pub url: String,
    pub text: String,
    pub timeout: Duration,
    pub retries: u32,
}

impl SlackTestMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            url: DEFAULT_WEBHOOK_URL.to_string(),
            text: text.into(),
            timeout: Duration::from_millis(10_000),
            retries: 0,
        }
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    fn validate(&self) -> Result<(), SlackTestError> {
        let chars = self.text.chars().count();
        if chars == 0 || chars > MAX_TEXT_CHARS {
            return Err(SlackTestError::InvalidText);
        }
        let timeout_ms = self.timeout.as_millis();
        if timeout_ms < MIN_TIMEOUT_MS as u128 || timeout_ms > MAX_TIMEOUT_MS as u128 {
            return Err(SlackTestError::InvalidTimeout);
        }
        if self.retries > MAX_RETRIES {
            return Err(SlackTestError::InvalidRetries);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlackTestResponse {
    #[serde(flatten)]
    pub result: HttpResult,
    /// The message went to the default `env:SLACK_WEBHOOK_URL` target
    pub used_env_default: bool,
}

/// Validate `message`, resolve its URL and post it.
///
/// Validation failures are returned before anything is sent. Delivery
/// failures are reported in the [`HttpResult`], never as errors.
#[instrument(skip_all)]
pub async fn send_slack_test(
    transport: &dyn HttpTransport,
    secrets: &dyn SecretResolver,
    message: &SlackTestMessage,
) -> Result<SlackTestResponse, SlackTestError> {
    message.validate()?;
    let raw = message.url.trim();

    let url = match raw.strip_prefix("env:") {
        Some(name) => {
            let name = name.trim();
            if name.is_empty() {
                return Err(SlackTestError::InvalidUrl);
            }
            let resolved = secrets
                .resolve(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| SlackTestError::MissingEnv(name.to_string()))?;
            if !is_slack_webhook_url(&resolved) {
                return Err(SlackTestError::ResolvedNotSlack);
            }
            resolved
        }
        None if is_slack_webhook_url(raw) => raw.to_string(),
        None => return Err(SlackTestError::InvalidUrl),
    };

    let mut request = HttpRequest::new(HttpMethod::Post, &url);
    request
        .headers
        .insert("content-type".to_string(), "application/json".to_string());
    request.body = Some(serde_json::json!({ "text": message.text }));
    request.timeout = message.timeout;
    request.retries = message.retries;

    let result = execute_http_request(transport, &request).await;
    info!(ok = result.ok, status = result.status, "Slack test message sent");

    Ok(SlackTestResponse {
        result,
        used_env_default: raw == DEFAULT_WEBHOOK_URL,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::web::{TransportError, TransportResponse};
    use crate::workflow::StaticSecrets;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    const HOOK: &str = "https://hooks.slack.com/services/T000/B000/XXXX";

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<HttpRequest>>,
    }

    #[async_trait]
    impl HttpTransport for Recorder {
        async fn send(&self, request: &HttpRequest) -> Result<TransportResponse, TransportError> {
            self.sent.lock().unwrap().push(request.clone());
            Ok(TransportResponse {
                status: 200,
                body_text: "ok".to_string(),
            })
        }
    }

    fn secrets(value: &str) -> StaticSecrets {
        StaticSecrets::new().with("SLACK_WEBHOOK_URL", value)
    }

    #[tokio::test]
    async fn test_default_env_url_resolved_and_sent() {
        let transport = Recorder::default();
        let response = send_slack_test(&transport, &secrets(HOOK), &SlackTestMessage::new("ping"))
            .await
            .unwrap();

        assert!(response.result.ok);
        assert!(response.used_env_default);

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url, HOOK);
        assert_eq!(sent[0].body, Some(json!({"text": "ping"})));
        assert_eq!(sent[0].timeout, Duration::from_millis(10_000));
    }

    #[tokio::test]
    async fn test_literal_url_not_env_default() {
        let transport = Recorder::default();
        let message = SlackTestMessage::new("ping").url(HOOK);
        let response = send_slack_test(&transport, &StaticSecrets::new(), &message)
            .await
            .unwrap();
        assert!(!response.used_env_default);

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["usedEnvDefault"], json!(false));
        assert_eq!(value["retriesUsed"], json!(0));
    }

    #[tokio::test]
    async fn test_rejections_send_nothing() {
        let transport = Recorder::default();
        let none = StaticSecrets::new();

        let cases = [
            (
                SlackTestMessage::new("ping"),
                SlackTestError::MissingEnv("SLACK_WEBHOOK_URL".to_string()),
            ),
            (
                SlackTestMessage::new("ping").url("https://example.com/hook"),
                SlackTestError::InvalidUrl,
            ),
            (
                SlackTestMessage::new("ping").url("env: "),
                SlackTestError::InvalidUrl,
            ),
            (
                SlackTestMessage::new("").url(HOOK),
                SlackTestError::InvalidText,
            ),
        ];
        for (message, expected) in cases {
            let err = send_slack_test(&transport, &none, &message).await.unwrap_err();
            assert_eq!(err, expected);
        }

        let not_slack = secrets("https://example.com/hook");
        assert_eq!(
            send_slack_test(&transport, &not_slack, &SlackTestMessage::new("ping"))
                .await
                .unwrap_err(),
            SlackTestError::ResolvedNotSlack
        );

        let mut slow = SlackTestMessage::new("ping").url(HOOK);
        slow.timeout = Duration::from_millis(50);
        assert_eq!(
            send_slack_test(&transport, &none, &slow).await.unwrap_err(),
            SlackTestError::InvalidTimeout
        );

        assert!(transport.sent.lock().unwrap().is_empty());
    }
}
