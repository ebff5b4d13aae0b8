use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisResult};

use super::Cache;

// ============================================================================
// Redis cache
// ============================================================================
//
// Entries live under a namespace prefix so one Redis instance can serve
// several deployments. Prefix operations walk cursor-based SCAN; KEYS would
// block the server. Every trait method catches transport errors, logs them,
// and degrades to a miss or no-op.
//
// ============================================================================

const NAMESPACE: &str = "orders-api:";
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

pub struct RedisCache {
    conn: MultiplexedConnection,
    default_ttl: Duration,
}

impl RedisCache {
    pub async fn connect(url: &str) -> RedisResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        Ok(Self {
            conn,
            default_ttl: DEFAULT_TTL,
        })
    }

    pub fn with_ttl(mut self, default_ttl: Duration) -> Self {
        self.default_ttl = default_ttl;
        self
    }

    fn namespaced(key: &str) -> String {
        format!("{NAMESPACE}{key}")
    }

    async fn scan_keys(&self, prefix: &str) -> RedisResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", Self::namespaced(prefix));
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(keys)
    }

    async fn try_get(&self, key: &str) -> RedisResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(Self::namespaced(key)).await
    }

    async fn try_set(&self, key: &str, value: &str, ttl: Duration) -> RedisResult<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(Self::namespaced(key))
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn try_remove(&self, key: &str) -> RedisResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(Self::namespaced(key)).await?;
        Ok(())
    }

    async fn try_exists(&self, key: &str) -> RedisResult<bool> {
        let mut conn = self.conn.clone();
        conn.exists(Self::namespaced(key)).await
    }

    async fn try_invalidate(&self, prefix: &str) -> RedisResult<usize> {
        let keys = self.scan_keys(prefix).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let _: () = conn.del(&keys).await?;
        Ok(keys.len())
    }

    async fn try_get_by_prefix(&self, prefix: &str) -> RedisResult<HashMap<String, String>> {
        let keys = self.scan_keys(prefix).await?;
        let mut conn = self.conn.clone();
        let mut entries = HashMap::with_capacity(keys.len());
        for key in keys {
            let value: Option<String> = conn.get(&key).await?;
            if let Some(value) = value {
                // hand callers the logical key, without the namespace
                let logical = key.strip_prefix(NAMESPACE).unwrap_or(&key).to_string();
                entries.insert(logical, value);
            }
        }
        Ok(entries)
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Option<String> {
        match self.try_get(key).await {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key, error = %err, "cache read failed, treating as miss");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        if let Err(err) = self.try_set(key, value, ttl).await {
            tracing::warn!(key, error = %err, "cache write failed, dropping entry");
        }
    }

    async fn remove(&self, key: &str) {
        if let Err(err) = self.try_remove(key).await {
            tracing::warn!(key, error = %err, "cache delete failed");
        }
    }

    async fn exists(&self, key: &str) -> bool {
        match self.try_exists(key).await {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(key, error = %err, "cache existence check failed");
                false
            }
        }
    }

    async fn invalidate_prefix(&self, prefix: &str) {
        match self.try_invalidate(prefix).await {
            Ok(dropped) if dropped > 0 => {
                tracing::debug!(prefix, dropped, "invalidated cache prefix");
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(prefix, error = %err, "cache prefix invalidation failed");
            }
        }
    }

    async fn get_by_prefix(&self, prefix: &str) -> HashMap<String, String> {
        match self.try_get_by_prefix(prefix).await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(prefix, error = %err, "cache prefix read failed");
                HashMap::new()
            }
        }
    }
}
