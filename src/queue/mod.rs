use async_trait::async_trait;
use thiserror::Error;

mod memory;
mod redis;

pub use memory::MemoryQueue;
pub use self::redis::RedisQueue;

// ============================================================================
// Work queue
// ============================================================================
//
// At-least-once delivery of opaque string payloads. A received message stays
// unacknowledged until the consumer acks it; nack puts it back for another
// attempt, so handlers must tolerate seeing the same payload twice.
//
// ============================================================================

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue backend error: {0}")]
    Backend(String),
}

/// A message popped from the queue, held in flight until acked or nacked.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub payload: String,
    receipt: u64,
}

#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn publish(&self, payload: &str) -> Result<(), QueueError>;

    /// Waits briefly for a message; `None` means the queue stayed empty for
    /// the whole poll window, so callers can re-check shutdown between
    /// polls. The message stays in flight until acked or nacked.
    async fn receive(&self) -> Result<Option<Delivery>, QueueError>;

    /// Permanently removes an in-flight message.
    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Returns an in-flight message to the queue for redelivery.
    async fn nack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Re-queues messages stranded in flight by a crashed consumer. Backends
    /// that cannot strand messages keep the default no-op.
    async fn recover(&self) -> Result<u64, QueueError> {
        Ok(0)
    }
}
