use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;

use crate::domain::{Gateway, HealthSnapshot};

/// Shared store of the latest health snapshot per gateway. Written only by
/// the health monitor on the current leader; read by every worker.
#[async_trait]
pub trait HealthStore: Send + Sync {
    async fn set(&self, gateway: Gateway, snapshot: &HealthSnapshot) -> Result<()>;
    /// Returns `None` when no snapshot has been written yet.
    async fn get(&self, gateway: Gateway) -> Result<Option<HealthSnapshot>>;
}

pub struct RedisHealthStore {
    client: redis::Client,
}

impl RedisHealthStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    fn key(gateway: Gateway) -> String {
        format!("health:{}", gateway.key())
    }
}

#[async_trait]
impl HealthStore for RedisHealthStore {
    async fn set(&self, gateway: Gateway, snapshot: &HealthSnapshot) -> Result<()> {
        let mut conn = self.client.get_multiplexed_tokio_connection().await?;
        let payload = serde_json::to_string(snapshot)?;
        // No TTL: a stale snapshot is better than none when the leader dies.
        let _: () = conn.set(Self::key(gateway), payload).await?;
        Ok(())
    }

    async fn get(&self, gateway: Gateway) -> Result<Option<HealthSnapshot>> {
        let mut conn = self.client.get_multiplexed_tokio_connection().await?;
        let payload: Option<String> = conn.get(Self::key(gateway)).await?;
        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

/// In-process store used by tests and single-node setups.
#[derive(Default)]
pub struct InMemoryHealthStore {
    snapshots: DashMap<Gateway, HealthSnapshot>,
}

impl InMemoryHealthStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HealthStore for InMemoryHealthStore {
    async fn set(&self, gateway: Gateway, snapshot: &HealthSnapshot) -> Result<()> {
        self.snapshots.insert(gateway, *snapshot);
        Ok(())
    }

    async fn get(&self, gateway: Gateway) -> Result<Option<HealthSnapshot>> {
        Ok(self.snapshots.get(&gateway).map(|entry| *entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_none_before_first_write() {
        let store = InMemoryHealthStore::new();
        assert_eq!(store.get(Gateway::Default).await.unwrap(), None);
    }

    #[tokio::test]
    async fn last_write_wins_per_gateway() {
        let store = InMemoryHealthStore::new();
        store
            .set(Gateway::Default, &HealthSnapshot::new(false, 100))
            .await
            .unwrap();
        store
            .set(Gateway::Default, &HealthSnapshot::new(true, 250))
            .await
            .unwrap();

        assert_eq!(
            store.get(Gateway::Default).await.unwrap(),
            Some(HealthSnapshot::new(true, 250))
        );
    }

    #[tokio::test]
    async fn gateways_are_tracked_independently() {
        let store = InMemoryHealthStore::new();
        store
            .set(Gateway::Default, &HealthSnapshot::new(true, 10))
            .await
            .unwrap();

        assert_eq!(store.get(Gateway::Fallback).await.unwrap(), None);
        assert_eq!(
            store.get(Gateway::Default).await.unwrap(),
            Some(HealthSnapshot::new(true, 10))
        );
    }
}
