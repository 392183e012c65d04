//! HTTP step execution
//!
//! [`execute_http_request`] performs one outbound call with a per-attempt
//! timeout and bounded retry with exponential backoff. It never fails:
//! every outcome, including network errors and timeouts, is folded into an
//! [`HttpResult`].
//!
//! The wire layer sits behind [`HttpTransport`]; [`ReqwestTransport`] is
//! the production implementation.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::workflow::HttpMethod;

const BASE_RETRY_DELAY_MS: u64 = 200;
const MAX_RETRY_DELAY_MS: u64 = 2_000;

/// A fully resolved outbound request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
    pub timeout: Duration,
    pub retries: u32,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: &str) -> Self {
        Self {
            method,
            url: url.to_string(),
            headers: BTreeMap::new(),
            body: None,
            timeout: Duration::from_millis(2_000),
            retries: 0,
        }
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.keys().any(|k| k.eq_ignore_ascii_case(name))
    }
}

/// What came back from one attempt
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body_text: String,
}

/// Network-level failure of one attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{name}: {message}")]
pub struct TransportError {
    pub name: String,
    pub message: String,
}

impl TransportError {
    pub fn new(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let name = if e.is_timeout() {
            "TimeoutError"
        } else if e.is_connect() {
            "ConnectError"
        } else if e.is_builder() {
            "BuilderError"
        } else if e.is_body() || e.is_decode() {
            "BodyError"
        } else {
            "RequestError"
        };
        Self::new(name, e.to_string())
    }
}

/// Sends a single request attempt
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<TransportResponse, TransportError>;
}

/// Normalized outcome of [`execute_http_request`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResult {
    pub ok: bool,
    pub status: u16,
    pub body_text: String,
    pub attempts: u32,
    pub retries_used: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TransportError>,
}

/// Backoff before the retry that follows `attempt` (0-based).
pub fn retry_delay(attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    let delay = BASE_RETRY_DELAY_MS.saturating_mul(factor).min(MAX_RETRY_DELAY_MS);
    Duration::from_millis(delay)
}

/// Run `request` with `1 + request.retries` attempts.
///
/// Statuses >= 400 and transport errors are retried; 2xx and 3xx return
/// immediately. The final attempt's response is returned as-is; a final
/// transport error yields `status: 0` with the error message as body.
pub async fn execute_http_request(
    transport: &dyn HttpTransport,
    request: &HttpRequest,
) -> HttpResult {
    let attempts = request.retries.saturating_add(1);
    let mut last_error = TransportError::new("RequestError", "HTTP request failed");

    for attempt in 0..attempts {
        let is_last = attempt + 1 == attempts;
        debug!(
            method = %request.method,
            url = %request.url,
            attempt = attempt + 1,
            attempts,
            "Executing HTTP request"
        );

        match tokio::time::timeout(request.timeout, transport.send(request)).await {
            Ok(Ok(response)) => {
                let ok = (200..300).contains(&response.status);
                if !ok && response.status >= 400 && !is_last {
                    let delay = retry_delay(attempt);
                    warn!(
                        status = response.status,
                        "Retrying request (attempt {}/{}) after {:?}",
                        attempt + 2,
                        attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }

                info!("{} {} -> {}", request.method, request.url, response.status);
                return HttpResult {
                    ok,
                    status: response.status,
                    body_text: response.body_text,
                    attempts,
                    retries_used: attempt,
                    error: None,
                };
            }
            Ok(Err(err)) => {
                warn!(error = %err, "Request failed");
                last_error = err;
            }
            Err(_) => {
                let message = format!(
                    "Request aborted (timeout after {}ms)",
                    request.timeout.as_millis()
                );
                warn!("{}", message);
                last_error = TransportError::new("TimeoutError", message);
            }
        }

        if !is_last {
            tokio::time::sleep(retry_delay(attempt)).await;
        }
    }

    HttpResult {
        ok: false,
        status: 0,
        body_text: last_error.message.clone(),
        attempts,
        retries_used: attempts - 1,
        error: Some(last_error),
    }
}

/// Parse a response body as JSON when it looks like an object or array.
pub fn parse_response_body(body_text: &str) -> Value {
    let trimmed = body_text.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = serde_json::from_str(trimmed) {
            return value;
        }
    }
    Value::String(body_text.to_string())
}

/// `https://hooks.slack.com/services/<a>/<b>/<c>`
pub fn is_slack_webhook_url(url: &str) -> bool {
    let Ok(parsed) = reqwest::Url::parse(url) else {
        return false;
    };
    if parsed.scheme() != "https" || parsed.host_str() != Some("hooks.slack.com") {
        return false;
    }
    let Some(rest) = parsed.path().strip_prefix("/services/") else {
        return false;
    };
    let segments: Vec<&str> = rest.split('/').collect();
    segments.len() == 3 && segments.iter().all(|s| !s.is_empty())
}

/// [`HttpTransport`] backed by `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(TransportError::from)?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
            HttpMethod::Put => self.client.put(&request.url),
            HttpMethod::Patch => self.client.patch(&request.url),
            HttpMethod::Delete => self.client.delete(&request.url),
        }
        .timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(body) = &request.body {
            if !request.has_header("content-type") {
                builder = builder.header(reqwest::header::CONTENT_TYPE, "application/json");
            }
            let encoded = serde_json::to_string(body)
                .map_err(|e| TransportError::new("SerializationError", e.to_string()))?;
            builder = builder.body(encoded);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body_text = response.text().await?;

        Ok(TransportResponse { status, body_text })
    }
}
