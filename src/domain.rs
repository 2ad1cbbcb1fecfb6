use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two downstream payment gateways a request can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gateway {
    Default,
    Fallback,
}

impl Gateway {
    pub fn as_str(self) -> &'static str {
        match self {
            Gateway::Default => "DEFAULT",
            Gateway::Fallback => "FALLBACK",
        }
    }

    /// Lowercase form used in store keys (`health:default`, `health:fallback`).
    pub fn key(self) -> &'static str {
        match self {
            Gateway::Default => "default",
            Gateway::Fallback => "fallback",
        }
    }

    pub fn processed_status(self) -> PaymentStatus {
        match self {
            Gateway::Default => PaymentStatus::ProcessedDefault,
            Gateway::Fallback => PaymentStatus::ProcessedFallback,
        }
    }
}

impl std::fmt::Display for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    ProcessedDefault,
    ProcessedFallback,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::ProcessedDefault => "PROCESSED_DEFAULT",
            PaymentStatus::ProcessedFallback => "PROCESSED_FALLBACK",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment submission as received from clients and carried through the
/// ingestion queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    #[serde(rename = "correlationId")]
    pub correlation_id: Uuid,
    pub amount: f64,
}

/// Latest observed health of one gateway. Written only by the health
/// monitor; everyone else reads. `minResponseTime` matches the gateway's
/// health endpoint wire name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub failing: bool,
    #[serde(rename = "minResponseTime")]
    pub min_response_time: u64,
}

impl HealthSnapshot {
    pub fn new(failing: bool, min_response_time: u64) -> Self {
        Self {
            failing,
            min_response_time,
        }
    }
}

/// Outcome of one processing attempt, keyed by correlation id in the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedPayment {
    pub correlation_id: Uuid,
    pub amount: f64,
    pub status: PaymentStatus,
    pub processor: Gateway,
    pub created_at: DateTime<Utc>,
}

impl ProcessedPayment {
    pub fn processed(request: &PaymentRequest, gateway: Gateway, at: DateTime<Utc>) -> Self {
        Self {
            correlation_id: request.correlation_id,
            amount: request.amount,
            status: gateway.processed_status(),
            processor: gateway,
            created_at: at,
        }
    }

    pub fn failed(request: &PaymentRequest, gateway: Gateway, at: DateTime<Utc>) -> Self {
        Self {
            correlation_id: request.correlation_id,
            amount: request.amount,
            status: PaymentStatus::Failed,
            processor: gateway,
            created_at: at,
        }
    }
}

/// Monetary total that rounds to one fractional digit when serialized.
/// The wrapped value keeps full precision; rounding happens only at the
/// response boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RoundedAmount(pub f64);

impl Serialize for RoundedAmount {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64((self.0 * 10.0).round() / 10.0)
    }
}

impl From<f64> for RoundedAmount {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GatewaySummary {
    #[serde(rename = "totalRequests")]
    pub total_requests: i64,
    #[serde(rename = "totalAmount")]
    pub total_amount: RoundedAmount,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PaymentsSummary {
    pub default: GatewaySummary,
    pub fallback: GatewaySummary,
}
