use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::ResourceRef;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub studio_id: Option<Uuid>,
    pub workshop_id: Option<Uuid>,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub people_count: i32,
    pub total_amount: Decimal,
    pub status: ReservationStatus,
    pub cancelled_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    Refunded,
}

impl Reservation {
    /// The resource this reservation targets. Exactly one of the two sides
    /// must be set; anything else is a corrupt row.
    pub fn resource_ref(&self) -> Result<ResourceRef> {
        match (self.studio_id, self.workshop_id) {
            (Some(id), None) => Ok(ResourceRef::Studio(id)),
            (None, Some(id)) => Ok(ResourceRef::Workshop(id)),
            _ => Err(AppError::InvalidState(format!(
                "Reservation {} must reference exactly one resource",
                self.id
            ))),
        }
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn duration_hours(&self) -> i64 {
        (self.end_time - self.start_time).num_hours()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReservationCommand {
    pub resource: ResourceRef,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub people_count: i32,
}

/// One hour of a resource's operating grid for a given date.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TimeSlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}
