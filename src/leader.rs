//! Lease-based leader election. One instance at a time holds an expiring
//! lock and runs the health monitor; the rest retry acquisition and stay
//! passive. This is a lease, not consensus: brief windows with zero or two
//! monitors are tolerated because snapshot writes are last-write-wins.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::health_monitor::HealthMonitor;

/// Lease lifetime granted on acquisition and on each renewal.
pub const LEASE_TTL: Duration = Duration::from_secs(10);
/// Renewal period; must stay under [`LEASE_TTL`] or the holder expires
/// between ticks.
pub const RENEW_INTERVAL: Duration = Duration::from_secs(8);
/// Backoff between acquisition attempts while another instance leads.
pub const ACQUIRE_RETRY: Duration = Duration::from_secs(3);

const LOCK_KEY: &str = "payment-relay:leader-lock";

/// Expiring exclusive lock shared by all instances.
#[async_trait]
pub trait LeaderLock: Send + Sync {
    /// Atomically takes the lock iff no unexpired holder exists.
    async fn try_acquire(&self, holder: &str, ttl: Duration) -> Result<bool>;
    /// Extends the lease iff `holder` still owns it. `Ok(false)` means
    /// leadership was lost.
    async fn renew(&self, holder: &str, ttl: Duration) -> Result<bool>;
}

pub struct RedisLeaderLock {
    client: redis::Client,
}

impl RedisLeaderLock {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LeaderLock for RedisLeaderLock {
    async fn try_acquire(&self, holder: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.client.get_multiplexed_tokio_connection().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(LOCK_KEY)
            .arg(holder)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn renew(&self, holder: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.client.get_multiplexed_tokio_connection().await?;
        let current: Option<String> = conn.get(LOCK_KEY).await?;
        if current.as_deref() != Some(holder) {
            return Ok(false);
        }
        let _: () = conn.set_ex(LOCK_KEY, holder, ttl.as_secs()).await?;
        Ok(true)
    }
}

/// Single-process lock for tests and local runs. Uses the tokio clock so
/// time-paused tests can step lease expiry deterministically.
#[derive(Default)]
pub struct InMemoryLeaderLock {
    state: Mutex<Option<(String, tokio::time::Instant)>>,
}

impl InMemoryLeaderLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaderLock for InMemoryLeaderLock {
    async fn try_acquire(&self, holder: &str, ttl: Duration) -> Result<bool> {
        let mut state = self.state.lock().await;
        let now = tokio::time::Instant::now();
        match state.as_ref() {
            Some((_, expiry)) if *expiry > now => Ok(false),
            _ => {
                *state = Some((holder.to_owned(), now + ttl));
                Ok(true)
            }
        }
    }

    async fn renew(&self, holder: &str, ttl: Duration) -> Result<bool> {
        let mut state = self.state.lock().await;
        let now = tokio::time::Instant::now();
        match state.as_ref() {
            Some((owner, expiry)) if owner == holder && *expiry > now => {
                *state = Some((holder.to_owned(), now + ttl));
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Read-only view of the current leadership state, handed to leader-only
/// loops so they can stop themselves after demotion.
#[derive(Clone, Default)]
pub struct LeadershipHandle {
    is_leader: Arc<AtomicBool>,
}

impl LeadershipHandle {
    pub fn is_leader(&self) -> bool {
        self.is_leader.load(Ordering::Relaxed)
    }

    pub(crate) fn set(&self, value: bool) {
        self.is_leader.store(value, Ordering::Relaxed);
    }
}

pub struct LeaderElection {
    lock: Arc<dyn LeaderLock>,
    instance_id: String,
    leadership: LeadershipHandle,
}

impl LeaderElection {
    pub fn new(lock: Arc<dyn LeaderLock>, instance_id: String) -> Self {
        Self {
            lock,
            instance_id,
            leadership: LeadershipHandle::default(),
        }
    }

    pub fn handle(&self) -> LeadershipHandle {
        self.leadership.clone()
    }

    /// Campaigns forever. Each term spawns a fresh monitor task tied to the
    /// leadership handle; after demotion the instance re-enters the
    /// acquisition loop instead of staying passive.
    pub async fn run(self, monitor: HealthMonitor) {
        loop {
            match self.lock.try_acquire(&self.instance_id, LEASE_TTL).await {
                Ok(true) => {
                    info!(instance = %self.instance_id, "acquired leader lease");
                    self.leadership.set(true);
                    tokio::spawn(monitor.clone().run(self.handle()));
                    self.renew_until_lost().await;
                    self.leadership.set(false);
                    warn!(instance = %self.instance_id, "lost leader lease");
                }
                Ok(false) => tokio::time::sleep(ACQUIRE_RETRY).await,
                Err(e) => {
                    warn!(instance = %self.instance_id, error = %e, "lease acquisition attempt failed");
                    tokio::time::sleep(ACQUIRE_RETRY).await;
                }
            }
        }
    }

    async fn renew_until_lost(&self) {
        let mut ticker = tokio::time::interval(RENEW_INTERVAL);
        // The first tick of an interval fires immediately; skip it so the
        // first renewal lands one full period after acquisition.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match self.lock.renew(&self.instance_id, LEASE_TTL).await {
                Ok(true) => {}
                Ok(false) => return,
                Err(e) => {
                    warn!(instance = %self.instance_id, error = %e, "lease renewal failed");
                    return;
                }
            }
        }
    }
}
