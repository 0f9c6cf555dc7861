use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::AppError;

pub mod http;
pub mod fake;

pub use fake::FakeGateway;
pub use http::HttpGateway;

/// Error surfaced by the external payment gateway. Carries the gateway's own
/// error code so it can be persisted on the failed payment/refund record.
#[derive(Error, Debug, Clone)]
#[error("[{code}] {message}")]
pub struct GatewayError {
    pub code: String,
    pub message: String,
}

impl GatewayError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::Gateway {
            code: err.code,
            message: err.message,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfirmation {
    pub status: String,
    pub method: Option<String>,
    pub transaction_key: String,
    pub approved_at: DateTime<Utc>,
}

/// One entry of the gateway's cancellation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayCancelEntry {
    pub transaction_key: String,
    pub amount: Decimal,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayCancellation {
    pub status: String,
    /// Some gateways return the key at the top level, some only in the
    /// cancellation history. Consumers check here first, then the last
    /// `cancels` entry.
    pub transaction_key: Option<String>,
    #[serde(default)]
    pub cancels: Vec<GatewayCancelEntry>,
}

impl GatewayCancellation {
    pub fn effective_transaction_key(&self) -> Option<&str> {
        self.transaction_key
            .as_deref()
            .or_else(|| self.cancels.last().map(|c| c.transaction_key.as_str()))
    }
}

/// Gateway-side view of a payment, used to defend against stale confirms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySnapshot {
    pub order_id: String,
    pub amount: Decimal,
    pub status: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Confirms (captures) a payment the customer authorized client-side.
    /// May be invoked more than once for the same key; callers are expected
    /// to have checked local state first.
    async fn confirm(
        &self,
        payment_key: &str,
        order_id: &str,
        amount: Decimal,
    ) -> std::result::Result<GatewayConfirmation, GatewayError>;

    /// Cancels a captured payment. `amount: None` means full cancellation.
    async fn cancel(
        &self,
        payment_key: &str,
        reason: &str,
        amount: Option<Decimal>,
    ) -> std::result::Result<GatewayCancellation, GatewayError>;

    /// Looks up the gateway-side record for an order, if any.
    async fn lookup(
        &self,
        order_id: &str,
    ) -> std::result::Result<Option<GatewaySnapshot>, GatewayError>;
}
