use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub order_id: String,
    pub payment_key: Option<String>,
    /// Charged amount, immutable after creation. Partial refunds accumulate
    /// in `canceled_amount` instead of mutating this.
    pub amount: Decimal,
    pub canceled_amount: Decimal,
    pub method: Option<String>,
    pub status: PaymentStatus,
    pub failure_code: Option<String>,
    pub failure_reason: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentStatus {
    Ready,
    Paid,
    Cancelled,
    PartialCanceled,
    Failed,
}

impl Payment {
    pub fn remaining_amount(&self) -> Decimal {
        self.amount - self.canceled_amount
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestPaymentCommand {
    pub reservation_id: Uuid,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmPaymentCommand {
    pub payment_key: String,
    pub order_id: String,
    pub amount: Decimal,
}

/// Handshake payload handed back to the client so it can open the gateway
/// checkout with the exact amount the platform expects.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutPayload {
    pub payment_id: Uuid,
    pub order_id: String,
    pub amount: Decimal,
    pub order_name: String,
}
