use std::env;
use std::time::Duration;

// ============================================================================
// Configuration
// ============================================================================

const DEFAULT_DATABASE_URL: &str = "postgres://localhost:5432/orders";
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub queue_name: String,
    pub cache_ttl: Duration,
    pub work_delay_min: Duration,
    pub work_delay_max: Duration,
    pub fanout_capacity: usize,
}

impl Config {
    /// Reads configuration from the environment, falling back to local
    /// development defaults.
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string()),
            queue_name: env::var("ORDER_QUEUE").unwrap_or_else(|_| "order_queue".to_string()),
            cache_ttl: Duration::from_secs(env_u64("CACHE_TTL_SECS", 600)),
            work_delay_min: Duration::from_millis(env_u64("WORK_DELAY_MIN_MS", 5_000)),
            work_delay_max: Duration::from_millis(env_u64("WORK_DELAY_MAX_MS", 15_000)),
            fanout_capacity: env_u64("FANOUT_CAPACITY", 64) as usize,
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
