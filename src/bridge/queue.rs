//! Request queue contract
//!
//! The engine needs only "send one message, long-poll one message, delete
//! it by receipt". Queue creation and redelivery policy belong to the
//! provider. [`MemoryQueue`] is the in-process implementation.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

/// A received message and the handle needed to delete it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub body: String,
    pub receipt_handle: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("Queue closed")]
    Closed,

    #[error("Unknown receipt handle: {0}")]
    UnknownReceipt(String),

    #[error("Queue transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait RequestQueue: Send + Sync {
    async fn send(&self, body: String) -> Result<(), QueueError>;

    /// Wait up to `wait` for one message. `Ok(None)` when nothing arrived.
    async fn receive(&self, wait: Duration) -> Result<Option<QueueMessage>, QueueError>;

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError>;
}

/// Unbounded in-memory queue. Received messages stay in flight until
/// deleted; they are never redelivered.
#[derive(Debug)]
pub struct MemoryQueue {
    tx: async_channel::Sender<String>,
    rx: async_channel::Receiver<String>,
    in_flight: DashMap<String, String>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        let (tx, rx) = async_channel::unbounded();
        Self {
            tx,
            rx,
            in_flight: DashMap::new(),
        }
    }

    /// Messages waiting to be received
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Received but not yet deleted
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Stop accepting messages; pending receivers see `Closed` once drained.
    pub fn close(&self) {
        self.tx.close();
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestQueue for MemoryQueue {
    async fn send(&self, body: String) -> Result<(), QueueError> {
        self.tx.send(body).await.map_err(|_| QueueError::Closed)
    }

    async fn receive(&self, wait: Duration) -> Result<Option<QueueMessage>, QueueError> {
        match tokio::time::timeout(wait, self.rx.recv()).await {
            Ok(Ok(body)) => {
                let receipt_handle = uuid::Uuid::new_v4().to_string();
                self.in_flight.insert(receipt_handle.clone(), body.clone());
                debug!(receipt = %receipt_handle, "Received queue message");
                Ok(Some(QueueMessage {
                    body,
                    receipt_handle,
                }))
            }
            Ok(Err(_)) => Err(QueueError::Closed),
            Err(_) => Ok(None),
        }
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.in_flight
            .remove(receipt_handle)
            .map(|_| ())
            .ok_or_else(|| QueueError::UnknownReceipt(receipt_handle.to_string()))
    }
}
