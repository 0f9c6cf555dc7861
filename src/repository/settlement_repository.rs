use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

use crate::{
    domain::{Settlement, SettlementStatus},
    error::{AppError, Result},
    repository::SettlementRepository,
};

#[derive(FromRow)]
struct SettlementRow {
    id: String,
    payment_id: String,
    owner_id: String,
    total_amount: String,
    commission_rate: String,
    platform_fee: String,
    payout_amount: String,
    tax_amount: String,
    status: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteSettlementRepository {
    pool: SqlitePool,
}

impl SqliteSettlementRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_settlement(row: SettlementRow) -> Result<Settlement> {
        Ok(Settlement {
            id: parse_uuid(&row.id)?,
            payment_id: parse_uuid(&row.payment_id)?,
            owner_id: parse_uuid(&row.owner_id)?,
            total_amount: parse_decimal(&row.total_amount)?,
            commission_rate: parse_decimal(&row.commission_rate)?,
            platform_fee: parse_decimal(&row.platform_fee)?,
            payout_amount: parse_decimal(&row.payout_amount)?,
            tax_amount: parse_decimal(&row.tax_amount)?,
            status: Self::parse_status(&row.status)?,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn parse_status(s: &str) -> Result<SettlementStatus> {
        match s {
            "Pending" => Ok(SettlementStatus::Pending),
            "Paid" => Ok(SettlementStatus::Paid),
            "Hold" => Ok(SettlementStatus::Hold),
            _ => Err(AppError::Database(format!(
                "Invalid settlement status: {}",
                s
            ))),
        }
    }

    fn status_to_str(status: SettlementStatus) -> &'static str {
        match status {
            SettlementStatus::Pending => "Pending",
            SettlementStatus::Paid => "Paid",
            SettlementStatus::Hold => "Hold",
        }
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    Decimal::from_str(s).map_err(|e| AppError::Database(e.to_string()))
}

#[async_trait]
impl SettlementRepository for SqliteSettlementRepository {
    async fn create(&self, settlement: Settlement) -> Result<Settlement> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO settlements (
                id, payment_id, owner_id, total_amount, commission_rate,
                platform_fee, payout_amount, tax_amount, status,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(settlement.id.to_string())
        .bind(settlement.payment_id.to_string())
        .bind(settlement.owner_id.to_string())
        .bind(settlement.total_amount.to_string())
        .bind(settlement.commission_rate.to_string())
        .bind(settlement.platform_fee.to_string())
        .bind(settlement.payout_amount.to_string())
        .bind(settlement.tax_amount.to_string())
        .bind(Self::status_to_str(settlement.status))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(settlement.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created settlement".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Settlement>> {
        let row = sqlx::query_as::<_, SettlementRow>(
            r#"
            SELECT id, payment_id, owner_id, total_amount, commission_rate,
                   platform_fee, payout_amount, tax_amount, status,
                   created_at, updated_at
            FROM settlements
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(Self::row_to_settlement(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_payment(&self, payment_id: Uuid) -> Result<Option<Settlement>> {
        let row = sqlx::query_as::<_, SettlementRow>(
            r#"
            SELECT id, payment_id, owner_id, total_amount, commission_rate,
                   platform_fee, payout_amount, tax_amount, status,
                   created_at, updated_at
            FROM settlements
            WHERE payment_id = ?
            "#,
        )
        .bind(payment_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(Self::row_to_settlement(r)?)),
            None => Ok(None),
        }
    }

    async fn update_status(&self, id: Uuid, status: SettlementStatus) -> Result<Settlement> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            UPDATE settlements
            SET status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(Self::status_to_str(status))
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve updated settlement".to_string())
        })
    }
}
