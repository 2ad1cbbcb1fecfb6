use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tracing::{error, info, warn};

use crate::domain::{Gateway, PaymentRequest, ProcessedPayment};
use crate::health_store::HealthStore;
use crate::ledger::Ledger;
use crate::processor::ProcessorClient;
use crate::queue::IngestionQueue;
use crate::routing::route;

/// Sleep between polls when the queue is empty or unreachable.
pub const IDLE_BACKOFF: Duration = Duration::from_secs(1);

/// One queue consumer. Workers share nothing besides the queue, the
/// snapshot store and the ledger, all safe for concurrent access.
#[derive(Clone)]
pub struct Worker {
    pub queue: Arc<dyn IngestionQueue>,
    pub health: Arc<dyn HealthStore>,
    pub processor: Arc<dyn ProcessorClient>,
    pub ledger: Arc<dyn Ledger>,
}

impl Worker {
    pub fn spawn_pool(self, concurrency: usize) {
        for worker_id in 0..concurrency {
            tokio::spawn(self.clone().run(worker_id));
        }
    }

    pub async fn run(self, worker_id: usize) {
        info!(worker = worker_id, "worker started");
        loop {
            let payload = match self.queue.claim().await {
                Ok(Some(payload)) => payload,
                Ok(None) => {
                    tokio::time::sleep(IDLE_BACKOFF).await;
                    continue;
                }
                Err(e) => {
                    warn!(worker = worker_id, error = %e, "queue claim failed");
                    tokio::time::sleep(IDLE_BACKOFF).await;
                    continue;
                }
            };
            if let Err(e) = self.process_one(&payload).await {
                // Not acked: the item stays in flight and is requeued by
                // recovery on the next boot.
                error!(worker = worker_id, error = %e, "payment attempt left in flight");
            }
        }
    }

    /// Runs one claimed payment to its outcome. The item is acked only
    /// after the outcome is in the ledger; a duplicate delivery in between
    /// is absorbed by the upsert.
    pub async fn process_one(&self, payload: &str) -> Result<()> {
        let request: PaymentRequest = match serde_json::from_str(payload) {
            Ok(request) => request,
            Err(e) => {
                // Poison message: acked so recovery cannot resurrect it.
                warn!(error = %e, "dropping undecodable payment");
                self.queue.ack(payload).await?;
                return Ok(());
            }
        };

        let default = self.health.get(Gateway::Default).await?.unwrap_or_default();
        let fallback = self.health.get(Gateway::Fallback).await?.unwrap_or_default();
        let gateway = route(&default, &fallback);

        let requested_at = Utc::now();
        let outcome = match self.processor.submit(gateway, &request, requested_at).await {
            Ok(()) => {
                info!(correlation_id = %request.correlation_id, gateway = %gateway, "payment processed");
                ProcessedPayment::processed(&request, gateway, requested_at)
            }
            Err(e) => {
                warn!(
                    correlation_id = %request.correlation_id,
                    gateway = %gateway,
                    error = %e,
                    "payment submission failed"
                );
                ProcessedPayment::failed(&request, gateway, requested_at)
            }
        };

        self.ledger.upsert(&outcome).await?;
        self.queue.ack(payload).await?;
        Ok(())
    }
}
