use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

use crate::{
    domain::{Payment, PaymentStatus},
    error::{AppError, Result},
    repository::PaymentRepository,
};

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    reservation_id: String,
    order_id: String,
    payment_key: Option<String>,
    amount: String,
    canceled_amount: String,
    method: Option<String>,
    status: String,
    failure_code: Option<String>,
    failure_reason: Option<String>,
    approved_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_payment(row: PaymentRow) -> Result<Payment> {
        Ok(Payment {
            id: parse_uuid(&row.id)?,
            reservation_id: parse_uuid(&row.reservation_id)?,
            order_id: row.order_id,
            payment_key: row.payment_key,
            amount: parse_decimal(&row.amount)?,
            canceled_amount: parse_decimal(&row.canceled_amount)?,
            method: row.method,
            status: Self::parse_status(&row.status)?,
            failure_code: row.failure_code,
            failure_reason: row.failure_reason,
            approved_at: row
                .approved_at
                .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn parse_status(s: &str) -> Result<PaymentStatus> {
        match s {
            "Ready" => Ok(PaymentStatus::Ready),
            "Paid" => Ok(PaymentStatus::Paid),
            "Cancelled" => Ok(PaymentStatus::Cancelled),
            "PartialCanceled" => Ok(PaymentStatus::PartialCanceled),
            "Failed" => Ok(PaymentStatus::Failed),
            _ => Err(AppError::Database(format!("Invalid payment status: {}", s))),
        }
    }

    fn status_to_str(status: PaymentStatus) -> &'static str {
        match status {
            PaymentStatus::Ready => "Ready",
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Cancelled => "Cancelled",
            PaymentStatus::PartialCanceled => "PartialCanceled",
            PaymentStatus::Failed => "Failed",
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
impl PaymentRepository for SqlitePaymentRepository {
    async fn create(&self, payment: Payment) -> Result<Payment> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, reservation_id, order_id, payment_key, amount,
                canceled_amount, method, status, failure_code, failure_reason,
                approved_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(payment.id.to_string())
        .bind(payment.reservation_id.to_string())
        .bind(&payment.order_id)
        .bind(&payment.payment_key)
        .bind(payment.amount.to_string())
        .bind(payment.canceled_amount.to_string())
        .bind(&payment.method)
        .bind(Self::status_to_str(payment.status))
        .bind(&payment.failure_code)
        .bind(&payment.failure_reason)
        .bind(payment.approved_at.map(|dt| dt.naive_utc()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(payment.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created payment".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, reservation_id, order_id, payment_key, amount,
                   canceled_amount, method, status, failure_code, failure_reason,
                   approved_at, created_at, updated_at
            FROM payments
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(Self::row_to_payment(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, reservation_id, order_id, payment_key, amount,
                   canceled_amount, method, status, failure_code, failure_reason,
                   approved_at, created_at, updated_at
            FROM payments
            WHERE order_id = ?
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(Self::row_to_payment(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_reservation(&self, reservation_id: Uuid) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, reservation_id, order_id, payment_key, amount,
                   canceled_amount, method, status, failure_code, failure_reason,
                   approved_at, created_at, updated_at
            FROM payments
            WHERE reservation_id = ?
            "#,
        )
        .bind(reservation_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(Self::row_to_payment(r)?)),
            None => Ok(None),
        }
    }

    async fn mark_paid(
        &self,
        id: Uuid,
        payment_key: &str,
        method: Option<&str>,
        approved_at: DateTime<Utc>,
    ) -> Result<Payment> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            UPDATE payments
            SET status = 'Paid',
                payment_key = ?,
                method = ?,
                approved_at = ?,
                failure_code = NULL,
                failure_reason = NULL,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(payment_key)
        .bind(method)
        .bind(approved_at.naive_utc())
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve updated payment".to_string())
        })
    }

    async fn mark_failed(&self, id: Uuid, code: &str, reason: &str) -> Result<Payment> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            UPDATE payments
            SET status = 'Failed',
                failure_code = ?,
                failure_reason = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(code)
        .bind(reason)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve updated payment".to_string())
        })
    }

    async fn apply_cancellation(
        &self,
        id: Uuid,
        canceled_amount: Decimal,
        status: PaymentStatus,
    ) -> Result<Payment> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            UPDATE payments
            SET status = ?,
                canceled_amount = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(Self::status_to_str(status))
        .bind(canceled_amount.to_string())
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve updated payment".to_string())
        })
    }
}
