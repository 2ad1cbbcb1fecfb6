pub mod api;
pub mod config;
pub mod domain;
pub mod health_monitor;
pub mod health_store;
pub mod leader;
pub mod ledger;
pub mod processor;
pub mod queue;
pub mod routing;
pub mod worker;

pub use config::AppConfig;
pub use domain::{
    Gateway, HealthSnapshot, PaymentRequest, PaymentStatus, PaymentsSummary, ProcessedPayment,
};
pub use routing::route;
