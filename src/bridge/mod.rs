//! Bridge modules for communication outside the interpreter
//!
//! This module provides:
//! - `web`: Outbound HTTP with per-attempt timeouts and retry
//! - `queue`: The request queue contract and an in-memory queue
//! - `envelope`: Typed queue messages (run requests and results)
//! - `worker`: Long-polling queue worker
//! - `waiter`: Correlation-id waiter for synchronous triggers
//! - `slack`: Test message to a Slack incoming webhook

pub mod envelope;
pub mod queue;
pub mod slack;
pub mod waiter;
pub mod web;
pub mod worker;

pub use envelope::{QueueEnvelope, RunRequest, RunResult};
pub use queue::{MemoryQueue, QueueError, QueueMessage, RequestQueue};
pub use slack::{send_slack_test, SlackTestError, SlackTestMessage, SlackTestResponse};
pub use waiter::{PendingRun, RunWaiter, WaitError};
pub use web::{
    execute_http_request, HttpRequest, HttpResult, HttpTransport, ReqwestTransport,
    TransportError, TransportResponse,
};
pub use worker::{PollOutcome, QueueWorker, RunHandler, WorkerSettings};
