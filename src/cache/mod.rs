use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

pub mod keys;
mod memory;
mod redis;

pub use memory::MemoryCache;
pub use self::redis::RedisCache;

// ============================================================================
// Cache layer
// ============================================================================
//
// A performance shortcut over the order store, never the source of truth.
// Any entry may vanish at any moment (TTL expiry, explicit invalidation,
// eviction) without affecting correctness. Every operation is fail-open: a
// broken transport reads as a miss and writes as a no-op, so the pipeline
// keeps working, slower, with the cache entirely gone.
//
// ============================================================================

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    /// Stores a value; `ttl` falls back to the implementation default.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>);

    async fn remove(&self, key: &str);

    async fn exists(&self, key: &str) -> bool;

    /// Drops every key sharing `prefix`.
    async fn invalidate_prefix(&self, prefix: &str);

    /// Snapshot of every live entry under `prefix`.
    async fn get_by_prefix(&self, prefix: &str) -> HashMap<String, String>;
}
