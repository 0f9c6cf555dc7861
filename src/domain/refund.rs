use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub reservation_id: Uuid,
    pub refund_amount: Decimal,
    pub original_amount: Decimal,
    pub cancellation_fee: Decimal,
    pub fee_percent: Decimal,
    pub reason: String,
    /// Human-readable description of the fee tier that was applied, kept for
    /// customer-facing receipts and reconciliation.
    pub policy: String,
    pub status: RefundStatus,
    pub transaction_key: Option<String>,
    pub failure_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RefundStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Result of applying the tiered cancellation policy to an amount.
/// Invariant: refund_amount + cancellation_fee == original_amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefundQuote {
    pub original_amount: Decimal,
    pub fee_percent: Decimal,
    pub cancellation_fee: Decimal,
    pub refund_amount: Decimal,
    pub policy: String,
}
