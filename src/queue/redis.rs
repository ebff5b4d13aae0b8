use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisResult};

use super::{Delivery, QueueError, WorkQueue};

// ============================================================================
// Redis-backed queue
// ============================================================================
//
// Reliable-list layout: producers LPUSH onto the pending list, the consumer
// LMOVEs the tail into a processing list where it stays until acked (LREM)
// or nacked (LREM plus RPUSH back to the consuming end). Messages stranded
// in the processing list by a crashed consumer are swept back on `recover`.
//
// ============================================================================

const POLL_WINDOW: Duration = Duration::from_millis(500);

pub struct RedisQueue {
    conn: MultiplexedConnection,
    pending_key: String,
    processing_key: String,
}

impl From<redis::RedisError> for QueueError {
    fn from(err: redis::RedisError) -> Self {
        QueueError::Backend(err.to_string())
    }
}

impl RedisQueue {
    pub async fn connect(url: &str, name: &str) -> RedisResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        Ok(Self {
            conn,
            pending_key: format!("queue:{name}"),
            processing_key: format!("queue:{name}:processing"),
        })
    }
}

#[async_trait]
impl WorkQueue for RedisQueue {
    async fn publish(&self, payload: &str) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: () = conn.lpush(&self.pending_key, payload).await?;
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Delivery>, QueueError> {
        let mut conn = self.conn.clone();
        let moved: Option<String> = redis::cmd("LMOVE")
            .arg(&self.pending_key)
            .arg(&self.processing_key)
            .arg("RIGHT")
            .arg("LEFT")
            .query_async(&mut conn)
            .await?;
        match moved {
            Some(payload) => Ok(Some(Delivery {
                payload,
                receipt: 0,
            })),
            None => {
                // Nothing pending; idle for one poll window instead of
                // hammering the server.
                tokio::time::sleep(POLL_WINDOW).await;
                Ok(None)
            }
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: () = conn.lrem(&self.processing_key, 1, &delivery.payload).await?;
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .lrem(&self.processing_key, 1, &delivery.payload)
            .rpush(&self.pending_key, &delivery.payload);
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn recover(&self) -> Result<u64, QueueError> {
        let mut conn = self.conn.clone();
        let mut recovered = 0;
        loop {
            let moved: Option<String> = redis::cmd("LMOVE")
                .arg(&self.processing_key)
                .arg(&self.pending_key)
                .arg("RIGHT")
                .arg("RIGHT")
                .query_async(&mut conn)
                .await?;
            if moved.is_none() {
                break;
            }
            recovered += 1;
        }
        Ok(recovered)
    }
}
