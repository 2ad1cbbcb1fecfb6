use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use redis::AsyncCommands;

/// Durable FIFO of serialized payment requests with at-least-once delivery.
///
/// `claim` atomically moves an item from the shared pending list to this
/// instance's in-flight list; `ack` removes it once the outcome is
/// persisted. Items claimed by a crashed instance stay in its in-flight
/// list until `recover` pushes them back at boot.
#[async_trait]
pub trait IngestionQueue: Send + Sync {
    async fn push(&self, payload: String) -> Result<()>;
    async fn claim(&self) -> Result<Option<String>>;
    async fn ack(&self, payload: &str) -> Result<()>;
    /// Requeues everything left in the in-flight list. Returns how many
    /// items were moved back.
    async fn recover(&self) -> Result<usize>;
}

pub struct RedisQueue {
    client: redis::Client,
    pending_key: String,
    processing_key: String,
}

impl RedisQueue {
    pub fn new(client: redis::Client, namespace: &str, instance_id: &str) -> Self {
        Self {
            client,
            pending_key: format!("{namespace}:pending"),
            processing_key: format!("{namespace}:processing:{instance_id}"),
        }
    }
}

#[async_trait]
impl IngestionQueue for RedisQueue {
    async fn push(&self, payload: String) -> Result<()> {
        let mut conn = self.client.get_multiplexed_tokio_connection().await?;
        let _: () = conn.lpush(&self.pending_key, payload).await?;
        Ok(())
    }

    async fn claim(&self) -> Result<Option<String>> {
        let mut conn = self.client.get_multiplexed_tokio_connection().await?;
        let moved: Option<String> = conn
            .rpoplpush(&self.pending_key, &self.processing_key)
            .await?;
        Ok(moved)
    }

    async fn ack(&self, payload: &str) -> Result<()> {
        let mut conn = self.client.get_multiplexed_tokio_connection().await?;
        // Removes one occurrence; duplicate payloads ack one claim each.
        let _: i64 = conn.lrem(&self.processing_key, 1, payload).await?;
        Ok(())
    }

    async fn recover(&self) -> Result<usize> {
        let mut conn = self.client.get_multiplexed_tokio_connection().await?;
        let mut moved = 0;
        loop {
            let item: Option<String> = conn
                .rpoplpush(&self.processing_key, &self.pending_key)
                .await?;
            if item.is_none() {
                return Ok(moved);
            }
            moved += 1;
        }
    }
}

/// In-process queue used by tests and single-node setups.
#[derive(Default)]
pub struct InMemoryQueue {
    pending: Mutex<VecDeque<String>>,
    in_flight: Mutex<Vec<String>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.lock().unwrap().len()
    }
}

#[async_trait]
impl IngestionQueue for InMemoryQueue {
    async fn push(&self, payload: String) -> Result<()> {
        self.pending.lock().unwrap().push_back(payload);
        Ok(())
    }

    async fn claim(&self) -> Result<Option<String>> {
        let mut pending = self.pending.lock().unwrap();
        match pending.pop_front() {
            Some(payload) => {
                self.in_flight.lock().unwrap().push(payload.clone());
                Ok(Some(payload))
            }
            None => Ok(None),
        }
    }

    async fn ack(&self, payload: &str) -> Result<()> {
        let mut in_flight = self.in_flight.lock().unwrap();
        if let Some(position) = in_flight.iter().position(|item| item == payload) {
            in_flight.remove(position);
        }
        Ok(())
    }

    async fn recover(&self) -> Result<usize> {
        // Same lock order as claim: pending before in_flight.
        let mut pending = self.pending.lock().unwrap();
        let mut in_flight = self.in_flight.lock().unwrap();
        let moved = in_flight.len();
        for item in in_flight.drain(..) {
            pending.push_back(item);
        }
        Ok(moved)
    }
}
