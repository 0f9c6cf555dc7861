use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

use crate::{
    domain::{Refund, RefundStatus},
    error::{AppError, Result},
    repository::RefundRepository,
};

#[derive(FromRow)]
struct RefundRow {
    id: String,
    payment_id: String,
    reservation_id: String,
    refund_amount: String,
    original_amount: String,
    cancellation_fee: String,
    fee_percent: String,
    reason: String,
    policy: String,
    status: String,
    transaction_key: Option<String>,
    failure_message: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteRefundRepository {
    pool: SqlitePool,
}

impl SqliteRefundRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_refund(row: RefundRow) -> Result<Refund> {
        Ok(Refund {
            id: parse_uuid(&row.id)?,
            payment_id: parse_uuid(&row.payment_id)?,
            reservation_id: parse_uuid(&row.reservation_id)?,
            refund_amount: parse_decimal(&row.refund_amount)?,
            original_amount: parse_decimal(&row.original_amount)?,
            cancellation_fee: parse_decimal(&row.cancellation_fee)?,
            fee_percent: parse_decimal(&row.fee_percent)?,
            reason: row.reason,
            policy: row.policy,
            status: Self::parse_status(&row.status)?,
            transaction_key: row.transaction_key,
            failure_message: row.failure_message,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn parse_status(s: &str) -> Result<RefundStatus> {
        match s {
            "Pending" => Ok(RefundStatus::Pending),
            "Processing" => Ok(RefundStatus::Processing),
            "Completed" => Ok(RefundStatus::Completed),
            "Failed" => Ok(RefundStatus::Failed),
            _ => Err(AppError::Database(format!("Invalid refund status: {}", s))),
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
impl RefundRepository for SqliteRefundRepository {
    async fn create(&self, refund: Refund) -> Result<Refund> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO refunds (
                id, payment_id, reservation_id, refund_amount, original_amount,
                cancellation_fee, fee_percent, reason, policy, status,
                transaction_key, failure_message, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(refund.id.to_string())
        .bind(refund.payment_id.to_string())
        .bind(refund.reservation_id.to_string())
        .bind(refund.refund_amount.to_string())
        .bind(refund.original_amount.to_string())
        .bind(refund.cancellation_fee.to_string())
        .bind(refund.fee_percent.to_string())
        .bind(&refund.reason)
        .bind(&refund.policy)
        .bind("Pending")
        .bind(&refund.transaction_key)
        .bind(&refund.failure_message)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(refund.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created refund".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Refund>> {
        let row = sqlx::query_as::<_, RefundRow>(
            r#"
            SELECT id, payment_id, reservation_id, refund_amount, original_amount,
                   cancellation_fee, fee_percent, reason, policy, status,
                   transaction_key, failure_message, created_at, updated_at
            FROM refunds
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(Self::row_to_refund(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_reservation(&self, reservation_id: Uuid) -> Result<Vec<Refund>> {
        let rows = sqlx::query_as::<_, RefundRow>(
            r#"
            SELECT id, payment_id, reservation_id, refund_amount, original_amount,
                   cancellation_fee, fee_percent, reason, policy, status,
                   transaction_key, failure_message, created_at, updated_at
            FROM refunds
            WHERE reservation_id = ?
            ORDER BY created_at
            "#,
        )
        .bind(reservation_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_refund).collect()
    }

    async fn mark_processing(&self, id: Uuid) -> Result<Refund> {
        self.set_status(id, "Processing", None, None).await
    }

    async fn mark_completed(&self, id: Uuid, transaction_key: Option<&str>) -> Result<Refund> {
        self.set_status(id, "Completed", transaction_key, None).await
    }

    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<Refund> {
        self.set_status(id, "Failed", None, Some(message)).await
    }
}

impl SqliteRefundRepository {
    async fn set_status(
        &self,
        id: Uuid,
        status: &str,
        transaction_key: Option<&str>,
        failure_message: Option<&str>,
    ) -> Result<Refund> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            UPDATE refunds
            SET status = ?,
                transaction_key = COALESCE(?, transaction_key),
                failure_message = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status)
        .bind(transaction_key)
        .bind(failure_message)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve updated refund".to_string())
        })
    }
}
