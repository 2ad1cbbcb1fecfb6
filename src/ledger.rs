use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sqlx::postgres::PgPool;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::{Gateway, PaymentStatus, PaymentsSummary, ProcessedPayment, RoundedAmount};

/// Closed `[from, to]` range over `created_at`; `None` means all time.
pub type TimeRange = Option<(DateTime<Utc>, DateTime<Utc>)>;

/// Store of processing outcomes keyed by correlation id.
///
/// `upsert` is the idempotence point of the pipeline: redelivered or
/// duplicate payments converge to the latest attempt's outcome.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn upsert(&self, record: &ProcessedPayment) -> Result<()>;
    async fn summary(&self, range: TimeRange) -> Result<PaymentsSummary>;
    async fn purge(&self) -> Result<()>;
}

const UPSERT_SQL: &str = "INSERT INTO payments (correlation_id, amount, status, processor, created_at) \
     VALUES ($1, $2, $3, $4, $5) \
     ON CONFLICT (correlation_id) DO UPDATE SET \
     amount = EXCLUDED.amount, status = EXCLUDED.status, \
     processor = EXCLUDED.processor, created_at = EXCLUDED.created_at";

const SUMMARY_SQL: &str = "SELECT processor, \
            COUNT(*) AS total_requests, \
            COALESCE(SUM(amount), 0) AS total_amount \
     FROM payments \
     WHERE (processor = 'DEFAULT' AND status = 'PROCESSED_DEFAULT') \
        OR (processor = 'FALLBACK' AND status = 'PROCESSED_FALLBACK') \
     GROUP BY processor";

const SUMMARY_RANGED_SQL: &str = "SELECT processor, \
            COUNT(*) AS total_requests, \
            COALESCE(SUM(amount), 0) AS total_amount \
     FROM payments \
     WHERE ((processor = 'DEFAULT' AND status = 'PROCESSED_DEFAULT') \
         OR (processor = 'FALLBACK' AND status = 'PROCESSED_FALLBACK')) \
       AND created_at BETWEEN $1 AND $2 \
     GROUP BY processor";

pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Ledger for PostgresLedger {
    async fn upsert(&self, record: &ProcessedPayment) -> Result<()> {
        sqlx::query(UPSERT_SQL)
            .bind(record.correlation_id)
            .bind(record.amount)
            .bind(record.status.as_str())
            .bind(record.processor.as_str())
            .bind(record.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn summary(&self, range: TimeRange) -> Result<PaymentsSummary> {
        let rows = match range {
            Some((from, to)) => {
                sqlx::query(SUMMARY_RANGED_SQL)
                    .bind(from)
                    .bind(to)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => sqlx::query(SUMMARY_SQL).fetch_all(&self.pool).await?,
        };

        let mut summary = PaymentsSummary::default();
        for row in rows {
            let processor: String = row.get("processor");
            let bucket = match processor.as_str() {
                "DEFAULT" => &mut summary.default,
                "FALLBACK" => &mut summary.fallback,
                _ => continue,
            };
            bucket.total_requests = row.get("total_requests");
            bucket.total_amount = RoundedAmount(row.get("total_amount"));
        }
        Ok(summary)
    }

    async fn purge(&self) -> Result<()> {
        sqlx::query("DELETE FROM payments").execute(&self.pool).await?;
        Ok(())
    }
}

/// In-process ledger used by tests and single-node setups.
#[derive(Default)]
pub struct InMemoryLedger {
    records: DashMap<Uuid, ProcessedPayment>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, correlation_id: Uuid) -> Option<ProcessedPayment> {
        self.records
            .get(&correlation_id)
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn upsert(&self, record: &ProcessedPayment) -> Result<()> {
        self.records.insert(record.correlation_id, record.clone());
        Ok(())
    }

    async fn summary(&self, range: TimeRange) -> Result<PaymentsSummary> {
        let mut summary = PaymentsSummary::default();
        for record in self.records.iter() {
            if let Some((from, to)) = range {
                if record.created_at < from || record.created_at > to {
                    continue;
                }
            }
            let bucket = match (record.processor, record.status) {
                (Gateway::Default, PaymentStatus::ProcessedDefault) => &mut summary.default,
                (Gateway::Fallback, PaymentStatus::ProcessedFallback) => &mut summary.fallback,
                _ => continue,
            };
            bucket.total_requests += 1;
            bucket.total_amount.0 += record.amount;
        }
        Ok(summary)
    }

    async fn purge(&self) -> Result<()> {
        self.records.clear();
        Ok(())
    }
}
