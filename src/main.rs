use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use order_flow::cache::RedisCache;
use order_flow::domain::NewOrder;
use order_flow::notify::Fanout;
use order_flow::queue::RedisQueue;
use order_flow::store::PgStore;
use order_flow::{Config, OrderService, SimulatedWork, StatusWorker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging with environment-based filtering; override with
    // RUST_LOG, e.g. RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_flow=debug")),
        )
        .init();

    let config = Config::from_env();

    tracing::info!("🚀 Starting order processing pipeline");

    tracing::info!(url = %config.database_url, "Connecting to Postgres");
    let store = Arc::new(PgStore::connect(&config.database_url).await?);

    tracing::info!(url = %config.redis_url, "Connecting to Redis");
    let cache = Arc::new(
        RedisCache::connect(&config.redis_url)
            .await?
            .with_ttl(config.cache_ttl),
    );
    let queue = Arc::new(RedisQueue::connect(&config.redis_url, &config.queue_name).await?);

    let fanout = Arc::new(Fanout::new(config.fanout_capacity));

    let service = Arc::new(OrderService::new(
        store.clone(),
        store,
        cache,
        queue.clone(),
        fanout.clone(),
        config.cache_ttl,
    ));

    // Log every event the fanout delivers, standing in for connected clients.
    let mut subscription = fanout.subscribe();
    tokio::spawn(async move {
        while let Some(event) = subscription.recv().await {
            tracing::info!(kind = event.kind(), order_id = %event.order_id(), "📣 event");
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = StatusWorker::new(
        service.clone(),
        queue,
        SimulatedWork::new(config.work_delay_min, config.work_delay_max),
    );
    let worker_handle = tokio::spawn(worker.run(shutdown_rx));

    // Seed one order so a fresh deployment shows the full lifecycle.
    let order = service
        .create(
            NewOrder {
                customer: "Ana".to_string(),
                product: "Widget".to_string(),
                amount: "100.00".parse()?,
            },
            "bootstrap",
        )
        .await?;
    tracing::info!(order_id = %order.id, "✅ Seeded demo order, the worker will advance it shortly");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down, letting any in-flight message finish");
    let _ = shutdown_tx.send(true);
    worker_handle.await?;

    Ok(())
}
