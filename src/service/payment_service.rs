use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        CheckoutPayload, ConfirmPaymentCommand, Payment, PaymentStatus, RequestPaymentCommand,
        ReservationStatus,
    },
    error::{AppError, Result},
    gateway::PaymentGateway,
    repository::{PaymentRepository, ReservationRepository},
    service::reservation_service::ReservationService,
    service::settlement_service::SettlementService,
};

const ORDER_ID_PREFIX: &str = "SB";
const ORDER_ID_ATTEMPTS: usize = 5;

pub struct PaymentService {
    payment_repo: Arc<dyn PaymentRepository>,
    reservation_repo: Arc<dyn ReservationRepository>,
    reservation_service: Arc<ReservationService>,
    settlement_service: Arc<SettlementService>,
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentService {
    pub fn new(
        payment_repo: Arc<dyn PaymentRepository>,
        reservation_repo: Arc<dyn ReservationRepository>,
        reservation_service: Arc<ReservationService>,
        settlement_service: Arc<SettlementService>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            payment_repo,
            reservation_repo,
            reservation_service,
            settlement_service,
            gateway,
        }
    }

    /// Creates the payment intent for a pending reservation and returns the
    /// handshake payload the client needs to open gateway checkout.
    pub async fn request_payment(&self, cmd: RequestPaymentCommand) -> Result<CheckoutPayload> {
        let reservation = self
            .reservation_repo
            .find_by_id(cmd.reservation_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Reservation not found: {}", cmd.reservation_id))
            })?;

        if reservation.status != ReservationStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "Reservation {} is not awaiting payment ({:?})",
                reservation.id, reservation.status
            )));
        }

        if let Some(existing) = self
            .payment_repo
            .find_by_reservation(reservation.id)
            .await?
        {
            return Err(AppError::Conflict(format!(
                "Payment {} already requested for reservation {}",
                existing.order_id, reservation.id
            )));
        }

        // Exact decimal comparison: the client must echo the priced total.
        if cmd.amount != reservation.total_amount {
            return Err(AppError::Validation(format!(
                "Requested amount {} does not match reservation total {}",
                cmd.amount, reservation.total_amount
            )));
        }

        let order_id = self.generate_order_id().await?;

        let payment = self
            .payment_repo
            .create(Payment {
                id: Uuid::new_v4(),
                reservation_id: reservation.id,
                order_id,
                payment_key: None,
                amount: reservation.total_amount,
                canceled_amount: rust_decimal::Decimal::ZERO,
                method: None,
                status: PaymentStatus::Ready,
                failure_code: None,
                failure_reason: None,
                approved_at: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await?;

        tracing::info!(
            payment_id = %payment.id,
            order_id = %payment.order_id,
            "Payment intent created"
        );

        Ok(CheckoutPayload {
            payment_id: payment.id,
            order_id: payment.order_id,
            amount: payment.amount,
            order_name: format!(
                "Reservation on {} {}-{}",
                reservation.date, reservation.start_time, reservation.end_time
            ),
        })
    }

    /// Confirms a payment the customer authorized. Idempotent against client
    /// retries and replays: a payment that is already Paid fails with
    /// AlreadyProcessed before the gateway is ever invoked, so a duplicate
    /// confirm can never double-charge. The reservation's slot rows are
    /// claimed before the charge, so a confirm that can no longer win its
    /// time window also never reaches the gateway.
    pub async fn confirm_payment(&self, cmd: ConfirmPaymentCommand) -> Result<Payment> {
        let payment = self
            .payment_repo
            .find_by_order_id(&cmd.order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order not found: {}", cmd.order_id)))?;

        if payment.status == PaymentStatus::Paid {
            return Err(AppError::AlreadyProcessed(format!(
                "Order {} is already confirmed",
                cmd.order_id
            )));
        }

        self.validate_before_confirm(&payment, &cmd).await?;

        // Claim the slot rows before any money moves. If the window was
        // taken while this order sat in checkout, the confirm fails here
        // and the customer is never charged.
        self.reservation_service
            .begin_confirmation(payment.reservation_id)
            .await?;

        match self
            .gateway
            .confirm(&cmd.payment_key, &cmd.order_id, cmd.amount)
            .await
        {
            Ok(confirmation) => {
                let paid = self
                    .payment_repo
                    .mark_paid(
                        payment.id,
                        &cmd.payment_key,
                        confirmation.method.as_deref(),
                        confirmation.approved_at,
                    )
                    .await?;

                self.reservation_service
                    .finalize_confirmation(paid.reservation_id)
                    .await?;

                self.settlement_service.create_settlement(&paid).await?;

                tracing::info!(
                    payment_id = %paid.id,
                    order_id = %paid.order_id,
                    transaction_key = %confirmation.transaction_key,
                    "Payment confirmed"
                );
                Ok(paid)
            }
            Err(err) => {
                // Give the slots back, record the failure locally, then
                // propagate. A gateway failure must never look like success
                // to the caller.
                self.reservation_service
                    .abort_confirmation(payment.reservation_id)
                    .await?;
                self.payment_repo
                    .mark_failed(payment.id, &err.code, &err.message)
                    .await?;
                tracing::warn!(
                    payment_id = %payment.id,
                    code = %err.code,
                    "Gateway rejected payment confirmation"
                );
                Err(err.into())
            }
        }
    }

    /// Defends against stale confirms: the local record must still be Ready
    /// with the expected amount, and the gateway must know the order.
    async fn validate_before_confirm(
        &self,
        payment: &Payment,
        cmd: &ConfirmPaymentCommand,
    ) -> Result<()> {
        if payment.status != PaymentStatus::Ready {
            return Err(AppError::InvalidState(format!(
                "Order {} cannot be confirmed from {:?}",
                payment.order_id, payment.status
            )));
        }

        if cmd.amount != payment.amount {
            return Err(AppError::Validation(format!(
                "Confirmed amount {} does not match order amount {}",
                cmd.amount, payment.amount
            )));
        }

        let snapshot = self
            .gateway
            .lookup(&payment.order_id)
            .await
            .map_err(AppError::from)?;
        if snapshot.is_none() {
            return Err(AppError::NotFound(format!(
                "Gateway has no record of order {}",
                payment.order_id
            )));
        }

        Ok(())
    }

    /// `PREFIX_TIMESTAMP_RANDOM`, re-rolled on the unlikely collision. The
    /// unique index on order_id is the final arbiter.
    async fn generate_order_id(&self) -> Result<String> {
        for _ in 0..ORDER_ID_ATTEMPTS {
            let suffix: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(8)
                .map(char::from)
                .collect();
            let candidate = format!(
                "{}_{}_{}",
                ORDER_ID_PREFIX,
                Utc::now().timestamp_millis(),
                suffix
            );
            if self.payment_repo.find_by_order_id(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
        Err(AppError::Internal(
            "Could not generate a unique order id".to_string(),
        ))
    }
}
