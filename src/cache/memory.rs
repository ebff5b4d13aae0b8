use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::Cache;

pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

// ============================================================================
// In-memory cache
// ============================================================================
//
// Deadline-per-entry map for tests and single-process deployments. Expired
// entries are dropped lazily: reads skip them, writes sweep them.
//
// ============================================================================

struct Slot {
    value: String,
    expires_at: Instant,
}

pub struct MemoryCache {
    entries: RwLock<HashMap<String, Slot>>,
    default_ttl: Duration,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().await;
        let slot = entries.get(key)?;
        if slot.expires_at <= Instant::now() {
            return None;
        }
        Some(slot.value.clone())
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, slot| slot.expires_at > now);
        entries.insert(
            key.to_string(),
            Slot {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
    }

    async fn remove(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    async fn exists(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    async fn invalidate_prefix(&self, prefix: &str) {
        self.entries
            .write()
            .await
            .retain(|key, _| !key.starts_with(prefix));
    }

    async fn get_by_prefix(&self, prefix: &str) -> HashMap<String, String> {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .iter()
            .filter(|(key, slot)| key.starts_with(prefix) && slot.expires_at > now)
            .map(|(key, slot)| (key.clone(), slot.value.clone()))
            .collect()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = MemoryCache::new();
        cache.set("k", "v", None).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("v"));
        assert!(cache.exists("k").await);
        assert!(!cache.exists("missing").await);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_their_ttl() {
        let cache = MemoryCache::new();
        cache.set("k", "v", Some(Duration::from_secs(5))).await;

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("k").await, None);
        assert!(!cache.exists("k").await);
    }

    #[tokio::test]
    async fn remove_drops_a_single_key() {
        let cache = MemoryCache::new();
        cache.set("a", "1", None).await;
        cache.set("b", "2", None).await;
        cache.remove("a").await;
        assert_eq!(cache.get("a").await, None);
        assert_eq!(cache.get("b").await.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn prefix_invalidation_spares_other_namespaces() {
        let cache = MemoryCache::new();
        cache.set("orders:list:all", "x", None).await;
        cache.set("orders:list:ana", "y", None).await;
        cache.set("order:detail:1", "z", None).await;

        cache.invalidate_prefix("orders:list:").await;

        assert_eq!(cache.get("orders:list:all").await, None);
        assert_eq!(cache.get("orders:list:ana").await, None);
        assert_eq!(cache.get("order:detail:1").await.as_deref(), Some("z"));
    }

    #[tokio::test]
    async fn get_by_prefix_snapshots_live_entries() {
        let cache = MemoryCache::new();
        cache.set("dashboard:week", "w", None).await;
        cache.set("dashboard:month", "m", None).await;
        cache.set("orders:list:all", "x", None).await;

        let summaries = cache.get_by_prefix("dashboard:").await;
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries.get("dashboard:week").map(String::as_str), Some("w"));
    }
}
