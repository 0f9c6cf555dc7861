use chrono::{NaiveDate, Timelike, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        CreateReservationCommand, Refund, Reservation, ReservationStatus, Resource, ResourceRef,
        TimeSlot,
    },
    error::{AppError, Result},
    repository::{ReservationRepository, ResourceRepository},
    service::refund_service::RefundService,
    service::settings_service::{keys, SettingsProvider},
};

pub struct ReservationService {
    reservation_repo: Arc<dyn ReservationRepository>,
    resource_repo: Arc<dyn ResourceRepository>,
    refund_service: Arc<RefundService>,
    settings: Arc<dyn SettingsProvider>,
}

impl ReservationService {
    pub fn new(
        reservation_repo: Arc<dyn ReservationRepository>,
        resource_repo: Arc<dyn ResourceRepository>,
        refund_service: Arc<RefundService>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        Self {
            reservation_repo,
            resource_repo,
            refund_service,
            settings,
        }
    }

    pub async fn find(&self, id: Uuid) -> Result<Reservation> {
        self.reservation_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reservation not found: {}", id)))
    }

    /// Validates the command, prices it, checks for overlap with confirmed
    /// bookings, and persists the reservation as Pending.
    pub async fn create(&self, cmd: CreateReservationCommand) -> Result<Reservation> {
        let resource = self
            .resource_repo
            .find_resource(cmd.resource)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Resource not found: {}", cmd.resource.id()))
            })?;

        if !resource.active {
            return Err(AppError::Validation(format!(
                "{} is not accepting reservations",
                resource.name
            )));
        }

        self.validate_command(&cmd, &resource).await?;

        let existing = self
            .reservation_repo
            .find_confirmed_for_date(resource.id, cmd.date)
            .await?;
        let overlapping = existing
            .iter()
            .any(|r| r.start_time < cmd.end_time && cmd.start_time < r.end_time);
        if overlapping {
            return Err(AppError::Conflict(format!(
                "Time window {}-{} on {} is already booked",
                cmd.start_time, cmd.end_time, cmd.date
            )));
        }

        let total_amount = Self::price(&resource, &cmd);
        let min_amount = self.settings.decimal(keys::MIN_PAYMENT_AMOUNT).await?;
        if total_amount < min_amount {
            return Err(AppError::Validation(format!(
                "Total amount {} is below the minimum of {}",
                total_amount, min_amount
            )));
        }

        let (studio_id, workshop_id) = match cmd.resource {
            ResourceRef::Studio(id) => (Some(id), None),
            ResourceRef::Workshop(id) => (None, Some(id)),
        };

        let reservation = self
            .reservation_repo
            .create(Reservation {
                id: Uuid::new_v4(),
                studio_id,
                workshop_id,
                user_id: cmd.user_id,
                date: cmd.date,
                start_time: cmd.start_time,
                end_time: cmd.end_time,
                people_count: cmd.people_count,
                total_amount,
                status: ReservationStatus::Pending,
                cancelled_reason: None,
                cancelled_at: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await?;

        tracing::info!(
            reservation_id = %reservation.id,
            total = %reservation.total_amount,
            "Reservation created"
        );
        Ok(reservation)
    }

    async fn validate_command(
        &self,
        cmd: &CreateReservationCommand,
        resource: &Resource,
    ) -> Result<()> {
        if cmd.people_count < resource.min_people || cmd.people_count > resource.max_people {
            return Err(AppError::Validation(format!(
                "People count must be between {} and {}",
                resource.min_people, resource.max_people
            )));
        }

        let now = Utc::now().naive_utc();
        let today = now.date();
        if cmd.date < today {
            return Err(AppError::Validation(
                "Reservation date is in the past".to_string(),
            ));
        }
        if cmd.date == today && cmd.start_time <= now.time() {
            return Err(AppError::Validation(
                "Reservation start time is in the past".to_string(),
            ));
        }

        let max_advance_days = self.settings.int(keys::MAX_ADVANCE_DAYS).await?;
        if (cmd.date - today).num_days() > max_advance_days {
            return Err(AppError::Validation(format!(
                "Reservations can be made at most {} days in advance",
                max_advance_days
            )));
        }

        // Bookings align to the hourly slot grid.
        if cmd.start_time.minute() != 0
            || cmd.start_time.second() != 0
            || cmd.end_time.minute() != 0
            || cmd.end_time.second() != 0
        {
            return Err(AppError::Validation(
                "Reservations must start and end on the hour".to_string(),
            ));
        }
        if cmd.end_time <= cmd.start_time {
            return Err(AppError::Validation(
                "End time must be after start time".to_string(),
            ));
        }

        let duration = (cmd.end_time - cmd.start_time).num_hours();
        let max_duration = self.settings.int(keys::MAX_DURATION_HOURS).await?;
        if duration > max_duration {
            return Err(AppError::Validation(format!(
                "Reservations are limited to {} hours",
                max_duration
            )));
        }

        let start_hour = cmd.start_time.hour();
        let end_hour = start_hour + duration as u32;
        if start_hour < resource.open_hour || end_hour > resource.close_hour {
            return Err(AppError::Validation(format!(
                "{} operates between {}:00 and {}:00",
                resource.name, resource.open_hour, resource.close_hour
            )));
        }

        Ok(())
    }

    fn price(resource: &Resource, cmd: &CreateReservationCommand) -> Decimal {
        let hours = Decimal::from((cmd.end_time - cmd.start_time).num_hours());
        let people = Decimal::from(cmd.people_count);
        resource.hourly_base_rate * hours + people * resource.per_person_rate * hours
    }

    /// Pending -> Confirmed, claiming the slot rows. Claiming first means a
    /// racing confirm for the same window loses with Conflict before any
    /// status change.
    pub async fn confirm_payment(&self, id: Uuid) -> Result<Reservation> {
        self.begin_confirmation(id).await?;
        self.finalize_confirmation(id).await
    }

    /// Claims the slot rows for a Pending reservation without changing its
    /// status. A racing confirm for the same window loses with Conflict
    /// here. Pair with `finalize_confirmation` on success or
    /// `abort_confirmation` to give the slots back.
    pub async fn begin_confirmation(&self, id: Uuid) -> Result<Reservation> {
        let reservation = self.find(id).await?;
        if reservation.status != ReservationStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "Reservation {} cannot be confirmed from {:?}",
                id, reservation.status
            )));
        }

        self.reservation_repo.claim_slots(&reservation).await?;
        Ok(reservation)
    }

    /// Completes a confirmation whose slots are already claimed.
    pub async fn finalize_confirmation(&self, id: Uuid) -> Result<Reservation> {
        self.reservation_repo
            .update_status(id, ReservationStatus::Confirmed)
            .await
    }

    /// Releases the slot rows claimed by `begin_confirmation`. The
    /// reservation stays Pending.
    pub async fn abort_confirmation(&self, id: Uuid) -> Result<()> {
        self.reservation_repo.release_slots(id).await
    }

    /// Confirmed -> Completed, once the booking has been used. Terminal.
    pub async fn complete(&self, id: Uuid) -> Result<Reservation> {
        let reservation = self.find(id).await?;
        if reservation.status != ReservationStatus::Confirmed {
            return Err(AppError::InvalidState(format!(
                "Reservation {} cannot be completed from {:?}",
                id, reservation.status
            )));
        }
        self.reservation_repo
            .update_status(id, ReservationStatus::Completed)
            .await
    }

    /// Cancels a reservation the requester owns, strictly before its start.
    ///
    /// For a Confirmed reservation this runs in two phases: the cancellation
    /// itself commits first, then the refund runs independently. A refund
    /// failure is persisted on the refund record and logged; it never undoes
    /// the cancellation.
    pub async fn cancel(
        &self,
        id: Uuid,
        requester_id: Uuid,
        reason: &str,
    ) -> Result<(Reservation, Option<Refund>)> {
        let reservation = self.find(id).await?;

        if reservation.user_id != requester_id {
            return Err(AppError::Forbidden);
        }

        match reservation.status {
            ReservationStatus::Pending | ReservationStatus::Confirmed => {}
            status => {
                return Err(AppError::InvalidState(format!(
                    "Reservation {} cannot be cancelled from {:?}",
                    id, status
                )));
            }
        }

        let now = Utc::now().naive_utc();
        if now >= reservation.starts_at() {
            return Err(AppError::Validation(
                "Reservations can only be cancelled before they start".to_string(),
            ));
        }

        if reservation.status == ReservationStatus::Pending {
            let cancelled = self
                .reservation_repo
                .mark_cancelled(id, reason, Utc::now())
                .await?;
            return Ok((cancelled, None));
        }

        // Phase 1: commit the cancellation and free the slots.
        let policy = self.refund_service.load_policy().await?;
        let quote = RefundService::quote(
            &policy,
            reservation.total_amount,
            reservation.starts_at(),
            now,
        );
        let cancelled = self
            .reservation_repo
            .mark_cancelled(id, reason, Utc::now())
            .await?;
        self.reservation_repo.release_slots(id).await?;

        // Phase 2: refund, in its own scope. Failure leaves a Failed refund
        // record for operator retry.
        let refund = match self.refund_service.process_refund(id, &quote, reason).await {
            Ok(refund) => Some(refund),
            Err(err) => {
                tracing::error!(
                    reservation_id = %id,
                    error = %err,
                    "Cancellation committed but refund did not complete"
                );
                None
            }
        };

        Ok((cancelled, refund))
    }

    /// The resource's hourly grid for a date, minus hours covered by
    /// Confirmed bookings.
    pub async fn available_times(
        &self,
        resource_ref: ResourceRef,
        date: NaiveDate,
    ) -> Result<Vec<TimeSlot>> {
        let resource = self
            .resource_repo
            .find_resource(resource_ref)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Resource not found: {}", resource_ref.id()))
            })?;

        let confirmed = self
            .reservation_repo
            .find_confirmed_for_date(resource.id, date)
            .await?;

        let mut slots = Vec::new();
        for hour in resource.open_hour..resource.close_hour {
            let start = chrono::NaiveTime::from_hms_opt(hour, 0, 0)
                .ok_or_else(|| AppError::Internal(format!("Invalid slot hour: {}", hour)))?;
            let taken = confirmed.iter().any(|r| {
                let booked_start = r.start_time.hour();
                let booked_end = booked_start + r.duration_hours() as u32;
                hour >= booked_start && hour < booked_end
            });
            if !taken {
                // 23:00 wraps to 00:00 for a resource that closes at 24.
                let (end, _) = start.overflowing_add_signed(chrono::Duration::hours(1));
                slots.push(TimeSlot { start, end });
            }
        }
        Ok(slots)
    }
}
