use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::domain::{PaymentRequest, PaymentsSummary};
use crate::ledger::Ledger;
use crate::queue::IngestionQueue;

#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<dyn IngestionQueue>,
    pub ledger: Arc<dyn Ledger>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryParams {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/payments", post(create_payment))
        .route("/payments-summary", get(payments_summary))
        .route("/purge-payments", post(purge_payments))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// Accepts a payment and enqueues it for asynchronous processing. The 202
/// only promises the request is durably queued, not processed.
async fn create_payment(
    State(state): State<AppState>,
    payload: Result<Json<PaymentRequest>, JsonRejection>,
) -> StatusCode {
    let Ok(Json(request)) = payload else {
        return StatusCode::BAD_REQUEST;
    };
    if !request.amount.is_finite() || request.amount <= 0.0 {
        return StatusCode::BAD_REQUEST;
    }

    let body = match serde_json::to_string(&request) {
        Ok(body) => body,
        Err(e) => {
            error!(error = %e, "failed to serialize payment for the queue");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };
    match state.queue.push(body).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(e) => {
            error!(error = %e, "failed to enqueue payment");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Per-gateway totals over an optional closed time range. `from` and `to`
/// come together or not at all.
async fn payments_summary(
    State(state): State<AppState>,
    Query(params): Query<SummaryParams>,
) -> Result<Json<PaymentsSummary>, StatusCode> {
    let range = match (params.from, params.to) {
        (Some(from), Some(to)) => Some((from, to)),
        (None, None) => None,
        _ => return Err(StatusCode::BAD_REQUEST),
    };

    match state.ledger.summary(range).await {
        Ok(summary) => Ok(Json(summary)),
        Err(e) => {
            error!(error = %e, "summary query failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn purge_payments(State(state): State<AppState>) -> StatusCode {
    match state.ledger.purge().await {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(e) => {
            error!(error = %e, "purge failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
