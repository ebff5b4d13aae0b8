use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use uuid::Uuid;

use crate::domain::OrderStatus;
use crate::errors::CoreError;
use crate::queue::{Delivery, WorkQueue};
use crate::service::OrderService;

// ============================================================================
// Status worker
// ============================================================================
//
// Long-lived consumer that drains the work queue one message at a time.
// Order-id payloads walk the order through Processing and, after a
// simulated work delay, Completed. Anything else is informational. A failed
// message is nacked back onto the queue and redelivered until it succeeds;
// holding a single unacknowledged message at a time is the backpressure.
//
// ============================================================================

/// Injected delay source standing in for real fulfillment work, so tests
/// can run with zero-length delays.
#[derive(Clone, Debug)]
pub struct SimulatedWork {
    min: Duration,
    max: Duration,
}

impl SimulatedWork {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
        }
    }

    pub fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }
}

impl Default for SimulatedWork {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(15))
    }
}

pub struct StatusWorker {
    service: Arc<OrderService>,
    queue: Arc<dyn WorkQueue>,
    work: SimulatedWork,
}

impl StatusWorker {
    pub fn new(service: Arc<OrderService>, queue: Arc<dyn WorkQueue>, work: SimulatedWork) -> Self {
        Self {
            service,
            queue,
            work,
        }
    }

    /// Runs until `shutdown` flips to true. Shutdown is cooperative: the
    /// loop stops pulling new messages but an in-flight message always
    /// finishes.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        match self.queue.recover().await {
            Ok(0) => {}
            Ok(count) => {
                tracing::info!(count, "re-queued messages stranded by a previous run")
            }
            Err(err) => tracing::warn!(error = %err, "failed to recover in-flight messages"),
        }

        tracing::info!("status worker started");

        while !*shutdown.borrow() {
            match self.queue.receive().await {
                Ok(Some(delivery)) => self.dispatch(delivery).await,
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "queue receive failed, backing off");
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
            }
        }

        tracing::info!("status worker stopped");
    }

    async fn dispatch(&self, delivery: Delivery) {
        match self.process(&delivery.payload).await {
            Ok(()) => {
                if let Err(err) = self.queue.ack(&delivery).await {
                    tracing::warn!(error = %err, payload = %delivery.payload, "failed to ack message");
                }
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    payload = %delivery.payload,
                    "processing failed, requeueing for redelivery"
                );
                if let Err(err) = self.queue.nack(&delivery).await {
                    tracing::error!(error = %err, payload = %delivery.payload, "failed to requeue message");
                }
            }
        }
    }

    async fn process(&self, payload: &str) -> Result<(), CoreError> {
        match Uuid::parse_str(payload) {
            Ok(order_id) => {
                self.service
                    .update_status(order_id, OrderStatus::Processing)
                    .await?;

                let delay = self.work.sample();
                tracing::debug!(
                    %order_id,
                    delay_ms = delay.as_millis() as u64,
                    "simulating fulfillment work"
                );
                tokio::time::sleep(delay).await;

                self.service
                    .update_status(order_id, OrderStatus::Completed)
                    .await?;
                Ok(())
            }
            Err(_) => {
                tracing::info!(message = payload, "informational message");
                Ok(())
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
