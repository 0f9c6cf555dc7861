mod common;

use chrono::{Duration, NaiveTime, Utc};
use rust_decimal_macros::dec;
use uuid::Uuid;

use slotbook::{
    domain::{
        RequestPaymentCommand, ReservationStatus, Resource, ResourceKind, ResourceRef,
    },
    error::AppError,
};

#[tokio::test]
async fn create_prices_base_plus_per_person() -> anyhow::Result<()> {
    let app = common::setup().await?;

    // 2 hours, 3 people: 10000*2 + 3*2000*2 = 32000
    let reservation = app.pending_reservation().await?;
    assert_eq!(reservation.total_amount, dec!(32000));
    assert_eq!(reservation.status, ReservationStatus::Pending);
    assert_eq!(reservation.duration_hours(), 2);

    Ok(())
}

#[tokio::test]
async fn create_rejects_bad_input() -> anyhow::Result<()> {
    let app = common::setup().await?;

    // Too many people for the studio
    let err = app
        .ctx
        .reservation_service
        .create(app.booking(7, 10, 12, 50))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "{err:?}");

    // Past date
    let err = app
        .ctx
        .reservation_service
        .create(app.booking(-1, 10, 12, 3))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "{err:?}");

    // Beyond the advance-booking window (default 90 days)
    let err = app
        .ctx
        .reservation_service
        .create(app.booking(120, 10, 12, 3))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "{err:?}");

    // Outside operating hours (studio closes at 22)
    let err = app
        .ctx
        .reservation_service
        .create(app.booking(7, 21, 23, 3))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "{err:?}");

    // Longer than the duration cap (default 8 hours)
    let err = app
        .ctx
        .reservation_service
        .create(app.booking(7, 9, 18, 3))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "{err:?}");

    Ok(())
}

#[tokio::test]
async fn create_rejects_overlap_with_confirmed_booking() -> anyhow::Result<()> {
    let app = common::setup().await?;

    let (confirmed, _) = app.paid_reservation().await?; // 10-12
    assert_eq!(confirmed.status, ReservationStatus::Confirmed);

    // 11-13 intersects 10-12
    let err = app
        .ctx
        .reservation_service
        .create(app.booking(7, 11, 13, 2))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "{err:?}");

    // 12-14 touches but does not intersect the half-open window
    let adjacent = app
        .ctx
        .reservation_service
        .create(app.booking(7, 12, 14, 2))
        .await?;
    assert_eq!(adjacent.status, ReservationStatus::Pending);

    Ok(())
}

#[tokio::test]
async fn slot_claim_breaks_the_confirm_race() -> anyhow::Result<()> {
    let app = common::setup().await?;

    // Both pass the overlap check while neither is confirmed yet.
    let first = app.ctx.reservation_service.create(app.booking(7, 10, 12, 3)).await?;
    let second = app.ctx.reservation_service.create(app.booking(7, 11, 13, 3)).await?;

    app.ctx.reservation_service.confirm_payment(first.id).await?;

    // The loser hits the slot unique index and stays Pending.
    let err = app
        .ctx
        .reservation_service
        .confirm_payment(second.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "{err:?}");
    let second = app.ctx.reservation_service.find(second.id).await?;
    assert_eq!(second.status, ReservationStatus::Pending);

    Ok(())
}

#[tokio::test]
async fn available_times_excludes_confirmed_hours() -> anyhow::Result<()> {
    let app = common::setup().await?;

    let (reservation, _) = app.paid_reservation().await?; // 10-12

    let slots = app
        .ctx
        .reservation_service
        .available_times(app.studio, reservation.date)
        .await?;

    // 13 operating hours (9..22) minus the 2 booked ones.
    assert_eq!(slots.len(), 11);
    let starts: Vec<NaiveTime> = slots.iter().map(|s| s.start).collect();
    assert!(!starts.contains(&NaiveTime::from_hms_opt(10, 0, 0).unwrap()));
    assert!(!starts.contains(&NaiveTime::from_hms_opt(11, 0, 0).unwrap()));
    assert!(starts.contains(&NaiveTime::from_hms_opt(9, 0, 0).unwrap()));
    assert!(starts.contains(&NaiveTime::from_hms_opt(12, 0, 0).unwrap()));

    Ok(())
}

#[tokio::test]
async fn available_times_handles_a_midnight_close() -> anyhow::Result<()> {
    let app = common::setup().await?;

    let late_studio = app
        .ctx
        .resource_repo
        .create_resource(Resource {
            id: Uuid::new_v4(),
            kind: ResourceKind::Studio,
            owner_id: app.owner_id,
            name: "Studio Nocturne".to_string(),
            hourly_base_rate: dec!(10000),
            per_person_rate: dec!(2000),
            min_people: 1,
            max_people: 10,
            open_hour: 20,
            close_hour: 24,
            active: true,
            created_at: Utc::now(),
        })
        .await?;

    let slots = app
        .ctx
        .reservation_service
        .available_times(
            ResourceRef::Studio(late_studio.id),
            (Utc::now() + Duration::days(7)).date_naive(),
        )
        .await?;

    assert_eq!(slots.len(), 4);
    let last = slots.last().expect("grid should not be empty");
    assert_eq!(last.start, NaiveTime::from_hms_opt(23, 0, 0).unwrap());
    // The final slot of a midnight close ends at 00:00, not 23:59:59.
    assert_eq!(last.end, NaiveTime::from_hms_opt(0, 0, 0).unwrap());

    Ok(())
}

#[tokio::test]
async fn state_machine_guards_transitions() -> anyhow::Result<()> {
    let app = common::setup().await?;

    let reservation = app.pending_reservation().await?;

    // Pending cannot complete
    let err = app
        .ctx
        .reservation_service
        .complete(reservation.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)), "{err:?}");

    app.ctx.reservation_service.confirm_payment(reservation.id).await?;

    // Confirmed cannot confirm again
    let err = app
        .ctx
        .reservation_service
        .confirm_payment(reservation.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)), "{err:?}");

    let completed = app.ctx.reservation_service.complete(reservation.id).await?;
    assert_eq!(completed.status, ReservationStatus::Completed);

    // Completed is terminal
    let err = app
        .ctx
        .reservation_service
        .cancel(reservation.id, app.user_id, "changed plans")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)), "{err:?}");

    Ok(())
}

#[tokio::test]
async fn cancel_requires_ownership() -> anyhow::Result<()> {
    let app = common::setup().await?;

    let reservation = app.pending_reservation().await?;
    let stranger = uuid::Uuid::new_v4();

    let err = app
        .ctx
        .reservation_service
        .cancel(reservation.id, stranger, "not mine")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden), "{err:?}");

    Ok(())
}

#[tokio::test]
async fn cancelling_a_pending_reservation_needs_no_refund() -> anyhow::Result<()> {
    let app = common::setup().await?;

    let reservation = app.pending_reservation().await?;
    let (cancelled, refund) = app
        .ctx
        .reservation_service
        .cancel(reservation.id, app.user_id, "changed plans")
        .await?;

    assert_eq!(cancelled.status, ReservationStatus::Cancelled);
    assert_eq!(cancelled.cancelled_reason.as_deref(), Some("changed plans"));
    assert!(cancelled.cancelled_at.is_some());
    assert!(refund.is_none());

    Ok(())
}

#[tokio::test]
async fn pending_reservation_below_minimum_amount_is_rejected() -> anyhow::Result<()> {
    let app = common::setup().await?;

    // Raise the floor above the 32000 this booking prices at.
    app.ctx
        .settings_service
        .update_setting(
            "payment.min.amount",
            slotbook::domain::UpdateSettingRequest {
                value: "50000".to_string(),
                reason: None,
            },
            None,
        )
        .await?;

    let err = app
        .ctx
        .reservation_service
        .create(app.booking(7, 10, 12, 3))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "{err:?}");

    Ok(())
}

#[tokio::test]
async fn request_payment_requires_exact_amount() -> anyhow::Result<()> {
    let app = common::setup().await?;

    let reservation = app.pending_reservation().await?;
    let err = app
        .ctx
        .payment_service
        .request_payment(RequestPaymentCommand {
            reservation_id: reservation.id,
            amount: dec!(31999),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "{err:?}");

    Ok(())
}
