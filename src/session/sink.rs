//! Delivery sink seam.
//!
//! A `DeliverySink` is the per-submission attachment point for consumers
//! that must receive each chunk as it is emitted — a chat gateway posting
//! messages, a UI pushing updates. Sessions without a sink are observable
//! on the event bus only.

use async_trait::async_trait;
use thiserror::Error;

use super::state::StreamChunk;

/// Error from delivering a chunk to a sink.
#[derive(Debug, Error)]
#[error("chunk delivery failed: {0}")]
pub struct DeliveryError(pub String);

impl DeliveryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Receiver of emitted chunks for one session.
///
/// A returned error terminates the session's delivery loop: the session
/// transitions to the error status with the message recorded, keeping
/// every previously delivered chunk in its record. Delivery failures are
/// not retried here; wrap the sink's own upstream calls in
/// [`with_retry`](crate::retry::with_retry) instead.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn deliver(&self, chunk: &StreamChunk) -> Result<(), DeliveryError>;
}
