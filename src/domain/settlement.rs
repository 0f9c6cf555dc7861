use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub owner_id: Uuid,
    pub total_amount: Decimal,
    pub commission_rate: Decimal,
    pub platform_fee: Decimal,
    pub payout_amount: Decimal,
    pub tax_amount: Decimal,
    pub status: SettlementStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SettlementStatus {
    Pending,
    Paid,
    Hold,
}
