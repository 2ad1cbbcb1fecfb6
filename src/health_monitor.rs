//! Leader-only poller keeping the health snapshot store current.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{Gateway, HealthSnapshot};
use crate::health_store::HealthStore;
use crate::leader::LeadershipHandle;

/// Delay between probe rounds. The gateways rate-limit their health
/// endpoint, so this also bounds how often we are allowed to ask.
pub const PROBE_INTERVAL: Duration = Duration::from_secs(5);
/// Per-request timeout for one health probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    #[error("gateway returned {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed health body: {0}")]
    Malformed(reqwest::Error),
}

/// Fetches one gateway's advertised health.
#[async_trait]
pub trait GatewayProbe: Send + Sync {
    async fn fetch_health(&self, gateway: Gateway) -> Result<HealthSnapshot, ProbeError>;
}

pub struct HttpGatewayProbe {
    client: reqwest::Client,
    default_url: String,
    fallback_url: String,
}

impl HttpGatewayProbe {
    pub fn new(default_url: String, fallback_url: String) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(PROBE_TIMEOUT).build()?;
        Ok(Self {
            client,
            default_url,
            fallback_url,
        })
    }

    fn base_url(&self, gateway: Gateway) -> &str {
        match gateway {
            Gateway::Default => &self.default_url,
            Gateway::Fallback => &self.fallback_url,
        }
    }
}

#[async_trait]
impl GatewayProbe for HttpGatewayProbe {
    async fn fetch_health(&self, gateway: Gateway) -> Result<HealthSnapshot, ProbeError> {
        let url = format!("{}/payments/service-health", self.base_url(gateway));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(ProbeError::Transport)?;
        if !response.status().is_success() {
            return Err(ProbeError::Status(response.status()));
        }
        response
            .json::<HealthSnapshot>()
            .await
            .map_err(ProbeError::Malformed)
    }
}

#[derive(Clone)]
pub struct HealthMonitor {
    probe: Arc<dyn GatewayProbe>,
    store: Arc<dyn HealthStore>,
}

impl HealthMonitor {
    pub fn new(probe: Arc<dyn GatewayProbe>, store: Arc<dyn HealthStore>) -> Self {
        Self { probe, store }
    }

    /// Probes both gateways every [`PROBE_INTERVAL`] until leadership is
    /// lost. Both probes of a round are joined before the next tick, so a
    /// stalled gateway cannot pile up outstanding requests.
    pub async fn run(self, leadership: LeadershipHandle) {
        let mut ticker = tokio::time::interval(PROBE_INTERVAL);
        loop {
            ticker.tick().await;
            if !leadership.is_leader() {
                info!("health monitor stopping, leadership lost");
                return;
            }
            tokio::join!(self.check(Gateway::Default), self.check(Gateway::Fallback));
        }
    }

    /// One probe round for one gateway. A failed probe leaves the stored
    /// snapshot untouched: stale data still routes, a synthesized failure
    /// would lie about the gateway's advertised state.
    async fn check(&self, gateway: Gateway) {
        match self.probe.fetch_health(gateway).await {
            Ok(snapshot) => {
                debug!(
                    gateway = %gateway,
                    failing = snapshot.failing,
                    min_response_time = snapshot.min_response_time,
                    "health snapshot updated"
                );
                if let Err(e) = self.store.set(gateway, &snapshot).await {
                    warn!(gateway = %gateway, error = %e, "failed to store health snapshot");
                }
            }
            Err(e) => {
                warn!(gateway = %gateway, error = %e, "health probe failed, keeping previous snapshot");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health_store::InMemoryHealthStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Probe returning a fixed answer per gateway; `None` scripts a failure.
    struct StubProbe {
        default: Option<HealthSnapshot>,
        fallback: Option<HealthSnapshot>,
        calls: AtomicUsize,
    }

    impl StubProbe {
        fn new(default: Option<HealthSnapshot>, fallback: Option<HealthSnapshot>) -> Self {
            Self {
                default,
                fallback,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl GatewayProbe for StubProbe {
        async fn fetch_health(&self, gateway: Gateway) -> Result<HealthSnapshot, ProbeError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let scripted = match gateway {
                Gateway::Default => self.default,
                Gateway::Fallback => self.fallback,
            };
            scripted.ok_or(ProbeError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE))
        }
    }

    #[tokio::test]
    async fn successful_probe_overwrites_snapshot() {
        let store = Arc::new(InMemoryHealthStore::new());
        store
            .set(Gateway::Default, &HealthSnapshot::new(true, 900))
            .await
            .unwrap();

        let probe = Arc::new(StubProbe::new(
            Some(HealthSnapshot::new(false, 120)),
            Some(HealthSnapshot::new(false, 80)),
        ));
        let monitor = HealthMonitor::new(probe, store.clone());
        monitor.check(Gateway::Default).await;

        assert_eq!(
            store.get(Gateway::Default).await.unwrap(),
            Some(HealthSnapshot::new(false, 120))
        );
    }

    #[tokio::test]
    async fn failed_probe_keeps_previous_snapshot() {
        let store = Arc::new(InMemoryHealthStore::new());
        store
            .set(Gateway::Default, &HealthSnapshot::new(false, 42))
            .await
            .unwrap();

        let probe = Arc::new(StubProbe::new(None, None));
        let monitor = HealthMonitor::new(probe, store.clone());
        monitor.check(Gateway::Default).await;

        assert_eq!(
            store.get(Gateway::Default).await.unwrap(),
            Some(HealthSnapshot::new(false, 42))
        );
    }

    #[tokio::test]
    async fn gateways_fail_and_update_independently() {
        let store = Arc::new(InMemoryHealthStore::new());
        store
            .set(Gateway::Default, &HealthSnapshot::new(false, 7))
            .await
            .unwrap();

        // Default probe fails, fallback succeeds.
        let probe = Arc::new(StubProbe::new(None, Some(HealthSnapshot::new(true, 300))));
        let monitor = HealthMonitor::new(probe, store.clone());
        tokio::join!(
            monitor.check(Gateway::Default),
            monitor.check(Gateway::Fallback)
        );

        assert_eq!(
            store.get(Gateway::Default).await.unwrap(),
            Some(HealthSnapshot::new(false, 7))
        );
        assert_eq!(
            store.get(Gateway::Fallback).await.unwrap(),
            Some(HealthSnapshot::new(true, 300))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_stops_probing_after_demotion() {
        let store = Arc::new(InMemoryHealthStore::new());
        let probe = Arc::new(StubProbe::new(
            Some(HealthSnapshot::default()),
            Some(HealthSnapshot::default()),
        ));
        let leadership = LeadershipHandle::default();
        leadership.set(true);

        let monitor = HealthMonitor::new(probe.clone(), store);
        tokio::spawn(monitor.run(leadership.clone()));

        tokio::time::sleep(PROBE_INTERVAL * 2 + Duration::from_secs(1)).await;
        assert!(probe.calls.load(Ordering::Relaxed) >= 4);

        leadership.set(false);
        tokio::time::sleep(Duration::from_secs(1)).await;
        let settled = probe.calls.load(Ordering::Relaxed);

        tokio::time::sleep(PROBE_INTERVAL * 4).await;
        assert_eq!(probe.calls.load(Ordering::Relaxed), settled);
    }
}
