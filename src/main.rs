use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use payment_relay::api::{self, AppState};
use payment_relay::config::AppConfig;
use payment_relay::health_monitor::{HealthMonitor, HttpGatewayProbe};
use payment_relay::health_store::{HealthStore, RedisHealthStore};
use payment_relay::leader::{LeaderElection, LeaderLock, RedisLeaderLock};
use payment_relay::ledger::{Ledger, PostgresLedger};
use payment_relay::processor::{HttpProcessorClient, ProcessorClient};
use payment_relay::queue::{IngestionQueue, RedisQueue};
use payment_relay::worker::Worker;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::from_env()?;
    info!(
        instance = %config.instance_id,
        workers = config.worker_concurrency,
        "starting payment relay"
    );

    let redis_client = redis::Client::open(config.redis_url.clone())?;
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let queue: Arc<dyn IngestionQueue> = Arc::new(RedisQueue::new(
        redis_client.clone(),
        &config.queue_namespace,
        &config.instance_id,
    ));
    let health: Arc<dyn HealthStore> = Arc::new(RedisHealthStore::new(redis_client.clone()));
    let ledger: Arc<dyn Ledger> = Arc::new(PostgresLedger::new(pool));
    let lock: Arc<dyn LeaderLock> = Arc::new(RedisLeaderLock::new(redis_client));

    // Items claimed before the last shutdown go back to pending.
    let recovered = queue.recover().await?;
    if recovered > 0 {
        info!(count = recovered, "requeued in-flight payments from a previous run");
    }

    let probe = Arc::new(HttpGatewayProbe::new(
        config.default_processor_url.clone(),
        config.fallback_processor_url.clone(),
    )?);
    let monitor = HealthMonitor::new(probe, health.clone());
    let election = LeaderElection::new(lock, config.instance_id.clone());
    tokio::spawn(election.run(monitor));

    let processor: Arc<dyn ProcessorClient> = Arc::new(HttpProcessorClient::new(
        config.default_processor_url.clone(),
        config.fallback_processor_url.clone(),
    )?);
    let worker = Worker {
        queue: queue.clone(),
        health,
        processor,
        ledger: ledger.clone(),
    };
    worker.spawn_pool(config.worker_concurrency);

    let state = AppState { queue, ledger };
    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
