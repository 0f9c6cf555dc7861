mod common;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use slotbook::{
    domain::{PaymentStatus, RefundStatus, ReservationStatus, UpdateSettingRequest},
    error::AppError,
    service::settings_service::keys,
};

#[tokio::test]
async fn cancelling_with_free_notice_refunds_everything() -> anyhow::Result<()> {
    let app = common::setup().await?;

    // A week of notice is well past the default 48h free threshold.
    let (reservation, payment) = app.paid_reservation().await?;
    let (cancelled, refund) = app
        .ctx
        .reservation_service
        .cancel(reservation.id, app.user_id, "schedule change")
        .await?;

    let refund = refund.expect("refund should have been processed");
    assert_eq!(refund.status, RefundStatus::Completed);
    assert_eq!(refund.cancellation_fee, Decimal::ZERO);
    assert_eq!(refund.refund_amount, dec!(32000));
    assert_eq!(refund.original_amount, dec!(32000));
    assert!(refund.transaction_key.is_some());

    // Full refund: the gateway was asked for a full cancel.
    assert_eq!(app.gateway.last_cancel_amount(), Some(None));

    let payment = app
        .ctx
        .payment_repo
        .find_by_id(payment.id)
        .await?
        .expect("payment should exist");
    assert_eq!(payment.status, PaymentStatus::Cancelled);

    let reservation = app.ctx.reservation_service.find(cancelled.id).await?;
    assert_eq!(reservation.status, ReservationStatus::Refunded);

    Ok(())
}

#[tokio::test]
async fn early_tier_charges_the_configured_fee() -> anyhow::Result<()> {
    let app = common::setup().await?;

    // Push the free threshold out of reach so a week of notice lands in the
    // early tier (10%).
    app.ctx
        .settings_service
        .update_setting(
            keys::FREE_CANCEL_HOURS,
            UpdateSettingRequest {
                value: "1000".to_string(),
                reason: Some("test".to_string()),
            },
            None,
        )
        .await?;

    let (reservation, payment) = app.paid_reservation().await?;
    let (_, refund) = app
        .ctx
        .reservation_service
        .cancel(reservation.id, app.user_id, "schedule change")
        .await?;

    let refund = refund.expect("refund should have been processed");
    assert_eq!(refund.fee_percent, dec!(10));
    assert_eq!(refund.cancellation_fee, dec!(3200));
    assert_eq!(refund.refund_amount, dec!(28800));
    assert_eq!(
        refund.refund_amount + refund.cancellation_fee,
        refund.original_amount
    );

    // Partial refund: the fee stays captured.
    assert_eq!(app.gateway.last_cancel_amount(), Some(Some(dec!(28800))));
    let payment = app
        .ctx
        .payment_repo
        .find_by_id(payment.id)
        .await?
        .expect("payment should exist");
    assert_eq!(payment.status, PaymentStatus::PartialCanceled);
    assert_eq!(payment.canceled_amount, dec!(28800));
    assert_eq!(payment.remaining_amount(), dec!(3200));

    Ok(())
}

#[tokio::test]
async fn refund_failure_never_unwinds_the_cancellation() -> anyhow::Result<()> {
    let app = common::setup().await?;

    let (reservation, payment) = app.paid_reservation().await?;
    app.gateway.fail_cancel("PROVIDER_DOWN", "gateway maintenance");

    let (cancelled, refund) = app
        .ctx
        .reservation_service
        .cancel(reservation.id, app.user_id, "schedule change")
        .await?;

    // The cancellation committed even though the refund did not.
    assert_eq!(cancelled.status, ReservationStatus::Cancelled);
    assert!(refund.is_none());

    // The failure is persisted for the operator, payment untouched.
    let refunds = app.ctx.refund_repo.find_by_reservation(reservation.id).await?;
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].status, RefundStatus::Failed);
    assert!(refunds[0]
        .failure_message
        .as_deref()
        .unwrap_or_default()
        .contains("gateway maintenance"));

    let payment = app
        .ctx
        .payment_repo
        .find_by_id(payment.id)
        .await?
        .expect("payment should exist");
    assert_eq!(payment.status, PaymentStatus::Paid);

    Ok(())
}

#[tokio::test]
async fn operator_retry_completes_a_failed_refund_on_the_same_record() -> anyhow::Result<()> {
    let app = common::setup().await?;

    let (reservation, payment) = app.paid_reservation().await?;
    app.gateway.fail_cancel("PROVIDER_DOWN", "gateway maintenance");
    app.ctx
        .reservation_service
        .cancel(reservation.id, app.user_id, "schedule change")
        .await?;

    let failed = app.ctx.refund_repo.find_by_reservation(reservation.id).await?;
    let refund_id = failed[0].id;

    // Still failing: the retry fails again but stays retriable.
    let err = app.ctx.refund_service.retry_refund(refund_id).await.unwrap_err();
    assert!(matches!(err, AppError::Gateway { .. }), "{err:?}");

    app.gateway.clear_failures();
    let refund = app.ctx.refund_service.retry_refund(refund_id).await?;
    assert_eq!(refund.id, refund_id);
    assert_eq!(refund.status, RefundStatus::Completed);

    // Exactly one refund record for the whole saga.
    let refunds = app.ctx.refund_repo.find_by_reservation(reservation.id).await?;
    assert_eq!(refunds.len(), 1);

    let payment = app
        .ctx
        .payment_repo
        .find_by_id(payment.id)
        .await?
        .expect("payment should exist");
    assert_eq!(payment.status, PaymentStatus::Cancelled);

    let reservation = app.ctx.reservation_service.find(reservation.id).await?;
    assert_eq!(reservation.status, ReservationStatus::Refunded);

    Ok(())
}

#[tokio::test]
async fn completed_refunds_cannot_be_retried_or_duplicated() -> anyhow::Result<()> {
    let app = common::setup().await?;

    let (reservation, _) = app.paid_reservation().await?;
    let (_, refund) = app
        .ctx
        .reservation_service
        .cancel(reservation.id, app.user_id, "schedule change")
        .await?;
    let refund = refund.expect("refund should have been processed");

    let err = app.ctx.refund_service.retry_refund(refund.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)), "{err:?}");

    Ok(())
}

#[tokio::test]
async fn a_second_refund_attempt_for_the_same_cancellation_is_rejected() -> anyhow::Result<()> {
    let app = common::setup().await?;

    let (reservation, _) = app.paid_reservation().await?;
    app.gateway.fail_cancel("PROVIDER_DOWN", "gateway maintenance");
    app.ctx
        .reservation_service
        .cancel(reservation.id, app.user_id, "schedule change")
        .await?;
    app.gateway.clear_failures();

    // The payment is still Paid, but a refund record already exists: the
    // only way forward is retry_refund, never a second record.
    let policy = app.ctx.refund_service.load_policy().await?;
    let reservation = app.ctx.reservation_service.find(reservation.id).await?;
    let quote = slotbook::service::refund_service::RefundService::quote(
        &policy,
        reservation.total_amount,
        reservation.starts_at(),
        chrono::Utc::now().naive_utc(),
    );
    let err = app
        .ctx
        .refund_service
        .process_refund(reservation.id, &quote, "again")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyProcessed(_)), "{err:?}");

    Ok(())
}

#[tokio::test]
async fn transaction_key_falls_back_to_the_cancellation_history() -> anyhow::Result<()> {
    let app = common::setup().await?;

    app.gateway.put_cancel_key_in_history_only();

    let (reservation, _) = app.paid_reservation().await?;
    let (_, refund) = app
        .ctx
        .reservation_service
        .cancel(reservation.id, app.user_id, "schedule change")
        .await?;

    let refund = refund.expect("refund should have been processed");
    assert_eq!(refund.status, RefundStatus::Completed);
    assert!(refund.transaction_key.is_some());

    Ok(())
}
