use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::Order;

// ============================================================================
// Notification fanout
// ============================================================================
//
// Fire-and-forget delivery of order events to every live subscriber. There
// is no acknowledgment and no replay; clients re-fetch authoritative state
// when an event arrives rather than trusting the payload as a cache
// substitute. Send failures are observed and logged, never surfaced to the
// mutation that triggered them.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum OrderEvent {
    Created(Order),
    Updated(Order),
    StatusUpdated(Order),
    Deleted { id: Uuid },
}

impl OrderEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            OrderEvent::Created(_) => "created",
            OrderEvent::Updated(_) => "updated",
            OrderEvent::StatusUpdated(_) => "status-updated",
            OrderEvent::Deleted { .. } => "deleted",
        }
    }

    pub fn order_id(&self) -> Uuid {
        match self {
            OrderEvent::Created(order)
            | OrderEvent::Updated(order)
            | OrderEvent::StatusUpdated(order) => order.id,
            OrderEvent::Deleted { id } => *id,
        }
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Best effort: implementations log failures and never propagate them.
    async fn broadcast(&self, event: OrderEvent);
}

pub struct Fanout {
    sender: broadcast::Sender<OrderEvent>,
    subscribers: Arc<AtomicUsize>,
}

impl Fanout {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscribers: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let count = self.subscribers.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(subscribers = count, "subscriber connected");
        Subscription {
            receiver: self.sender.subscribe(),
            subscribers: Arc::clone(&self.subscribers),
        }
    }

    /// Live subscriber count, tracked for observability only; delivery does
    /// not depend on it.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSink for Fanout {
    async fn broadcast(&self, event: OrderEvent) {
        let kind = event.kind();
        let order_id = event.order_id();
        match self.sender.send(event) {
            Ok(receivers) => {
                tracing::debug!(kind, %order_id, receivers, "event broadcast");
            }
            Err(_) => {
                tracing::debug!(kind, %order_id, "no subscribers connected, event dropped");
            }
        }
    }
}

/// A live subscription; dropping it disconnects and decrements the counter.
pub struct Subscription {
    receiver: broadcast::Receiver<OrderEvent>,
    subscribers: Arc<AtomicUsize>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<OrderEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // a slow subscriber just misses those events
                    tracing::warn!(skipped, "subscriber lagged behind the fanout");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<OrderEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let count = self.subscribers.fetch_sub(1, Ordering::SeqCst) - 1;
        tracing::debug!(subscribers = count, "subscriber disconnected");
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
