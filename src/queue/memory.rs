use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use super::{Delivery, QueueError, WorkQueue};

const POLL_WINDOW: Duration = Duration::from_millis(200);

// ============================================================================
// In-memory queue
// ============================================================================
//
// Process-local queue with the same ack/nack contract as the Redis one.
// Nacked messages go back to the front so redelivery happens promptly.
//
// ============================================================================

#[derive(Default)]
pub struct MemoryQueue {
    pending: Mutex<VecDeque<String>>,
    inflight: Mutex<HashMap<u64, String>>,
    ready: Notify,
    next_receipt: AtomicU64,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    async fn pop(&self) -> Option<Delivery> {
        let payload = self.pending.lock().await.pop_front()?;
        let receipt = self.next_receipt.fetch_add(1, Ordering::Relaxed);
        self.inflight.lock().await.insert(receipt, payload.clone());
        Some(Delivery { payload, receipt })
    }
}

#[async_trait]
impl WorkQueue for MemoryQueue {
    async fn publish(&self, payload: &str) -> Result<(), QueueError> {
        self.pending.lock().await.push_back(payload.to_string());
        self.ready.notify_one();
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Delivery>, QueueError> {
        if let Some(delivery) = self.pop().await {
            return Ok(Some(delivery));
        }
        let _ = tokio::time::timeout(POLL_WINDOW, self.ready.notified()).await;
        Ok(self.pop().await)
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        self.inflight.lock().await.remove(&delivery.receipt);
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let payload = self.inflight.lock().await.remove(&delivery.receipt);
        if let Some(payload) = payload {
            self.pending.lock().await.push_front(payload);
            self.ready.notify_one();
        }
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
