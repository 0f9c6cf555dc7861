use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

use crate::{
    domain::{Reservation, ReservationStatus},
    error::{AppError, Result},
    repository::ReservationRepository,
};

#[derive(FromRow)]
struct ReservationRow {
    id: String,
    studio_id: Option<String>,
    workshop_id: Option<String>,
    user_id: String,
    reserved_date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    people_count: i32,
    total_amount: String,
    status: String,
    cancelled_reason: Option<String>,
    cancelled_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteReservationRepository {
    pool: SqlitePool,
}

impl SqliteReservationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_reservation(row: ReservationRow) -> Result<Reservation> {
        Ok(Reservation {
            id: parse_uuid(&row.id)?,
            studio_id: row.studio_id.as_deref().map(parse_uuid).transpose()?,
            workshop_id: row.workshop_id.as_deref().map(parse_uuid).transpose()?,
            user_id: parse_uuid(&row.user_id)?,
            date: row.reserved_date,
            start_time: row.start_time,
            end_time: row.end_time,
            people_count: row.people_count,
            total_amount: Decimal::from_str(&row.total_amount)
                .map_err(|e| AppError::Database(e.to_string()))?,
            status: Self::parse_status(&row.status)?,
            cancelled_reason: row.cancelled_reason,
            cancelled_at: row
                .cancelled_at
                .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn parse_status(s: &str) -> Result<ReservationStatus> {
        match s {
            "Pending" => Ok(ReservationStatus::Pending),
            "Confirmed" => Ok(ReservationStatus::Confirmed),
            "Cancelled" => Ok(ReservationStatus::Cancelled),
            "Completed" => Ok(ReservationStatus::Completed),
            "Refunded" => Ok(ReservationStatus::Refunded),
            _ => Err(AppError::Database(format!(
                "Invalid reservation status: {}",
                s
            ))),
        }
    }

    fn status_to_str(status: ReservationStatus) -> &'static str {
        match status {
            ReservationStatus::Pending => "Pending",
            ReservationStatus::Confirmed => "Confirmed",
            ReservationStatus::Cancelled => "Cancelled",
            ReservationStatus::Completed => "Completed",
            ReservationStatus::Refunded => "Refunded",
        }
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
}

#[async_trait]
impl ReservationRepository for SqliteReservationRepository {
    async fn create(&self, reservation: Reservation) -> Result<Reservation> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO reservations (
                id, studio_id, workshop_id, user_id, reserved_date,
                start_time, end_time, people_count, total_amount, status,
                cancelled_reason, cancelled_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(reservation.id.to_string())
        .bind(reservation.studio_id.map(|id| id.to_string()))
        .bind(reservation.workshop_id.map(|id| id.to_string()))
        .bind(reservation.user_id.to_string())
        .bind(reservation.date)
        .bind(reservation.start_time)
        .bind(reservation.end_time)
        .bind(reservation.people_count)
        .bind(reservation.total_amount.to_string())
        .bind(Self::status_to_str(reservation.status))
        .bind(&reservation.cancelled_reason)
        .bind(reservation.cancelled_at.map(|dt| dt.naive_utc()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(reservation.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created reservation".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Reservation>> {
        let row = sqlx::query_as::<_, ReservationRow>(
            r#"
            SELECT id, studio_id, workshop_id, user_id, reserved_date,
                   start_time, end_time, people_count, total_amount, status,
                   cancelled_reason, cancelled_at, created_at, updated_at
            FROM reservations
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(Self::row_to_reservation(r)?)),
            None => Ok(None),
        }
    }

    async fn find_confirmed_for_date(
        &self,
        resource_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Reservation>> {
        let id_str = resource_id.to_string();
        let rows = sqlx::query_as::<_, ReservationRow>(
            r#"
            SELECT id, studio_id, workshop_id, user_id, reserved_date,
                   start_time, end_time, people_count, total_amount, status,
                   cancelled_reason, cancelled_at, created_at, updated_at
            FROM reservations
            WHERE (studio_id = ? OR workshop_id = ?)
              AND reserved_date = ?
              AND status = 'Confirmed'
            ORDER BY start_time
            "#,
        )
        .bind(&id_str)
        .bind(&id_str)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_reservation).collect()
    }

    async fn update_status(&self, id: Uuid, status: ReservationStatus) -> Result<Reservation> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            UPDATE reservations
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
            AppError::Database("Failed to retrieve updated reservation".to_string())
        })
    }

    async fn mark_cancelled(
        &self,
        id: Uuid,
        reason: &str,
        cancelled_at: DateTime<Utc>,
    ) -> Result<Reservation> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            UPDATE reservations
            SET status = 'Cancelled',
                cancelled_reason = ?,
                cancelled_at = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(reason)
        .bind(cancelled_at.naive_utc())
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve cancelled reservation".to_string())
        })
    }

    async fn claim_slots(&self, reservation: &Reservation) -> Result<()> {
        let resource_id = reservation.resource_ref()?.id().to_string();
        let reservation_id = reservation.id.to_string();

        // All hours claim atomically: losing the race on any hour rolls the
        // whole claim back.
        let mut tx = self.pool.begin().await?;
        let start = reservation.start_time.hour() as i32;
        let end = start + reservation.duration_hours() as i32;
        for hour in start..end {
            sqlx::query(
                r#"
                INSERT INTO reservation_slots (resource_id, slot_date, slot_hour, reservation_id)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(&resource_id)
            .bind(reservation.date)
            .bind(hour)
            .bind(&reservation_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn release_slots(&self, reservation_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM reservation_slots WHERE reservation_id = ?")
            .bind(reservation_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
