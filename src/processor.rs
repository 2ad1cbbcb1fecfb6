use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Gateway, PaymentRequest};

/// Upper bound on one payment submission; bounds how long a worker can
/// stall on a slow gateway.
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("gateway returned {0}")]
    Status(reqwest::StatusCode),
}

/// Submits one payment to the chosen gateway. Any error is a hard failure
/// for that attempt; retry policy lives with the caller.
#[async_trait]
pub trait ProcessorClient: Send + Sync {
    async fn submit(
        &self,
        gateway: Gateway,
        request: &PaymentRequest,
        requested_at: DateTime<Utc>,
    ) -> Result<(), SubmitError>;
}

/// Body sent to a gateway's payments endpoint.
#[derive(Debug, Serialize)]
struct ProcessorPaymentRequest {
    #[serde(rename = "correlationId")]
    correlation_id: Uuid,
    amount: f64,
    #[serde(rename = "requestedAt")]
    requested_at: DateTime<Utc>,
}

pub struct HttpProcessorClient {
    client: reqwest::Client,
    default_url: String,
    fallback_url: String,
}

impl HttpProcessorClient {
    pub fn new(default_url: String, fallback_url: String) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(SUBMIT_TIMEOUT).build()?;
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
impl ProcessorClient for HttpProcessorClient {
    async fn submit(
        &self,
        gateway: Gateway,
        request: &PaymentRequest,
        requested_at: DateTime<Utc>,
    ) -> Result<(), SubmitError> {
        let body = ProcessorPaymentRequest {
            correlation_id: request.correlation_id,
            amount: request.amount,
            requested_at,
        };
        let response = self
            .client
            .post(format!("{}/payments", self.base_url(gateway)))
            .json(&body)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(SubmitError::Status(response.status()))
        }
    }
}
