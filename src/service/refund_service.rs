use chrono::NaiveDateTime;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{Payment, PaymentStatus, Refund, RefundQuote, RefundStatus, ReservationStatus},
    error::{AppError, Result},
    gateway::PaymentGateway,
    repository::{PaymentRepository, RefundRepository, ReservationRepository},
    service::settings_service::{keys, SettingsProvider},
};

/// Snapshot of the tiered cancellation-fee policy, loaded once per
/// cancellation so all three thresholds come from the same settings read.
#[derive(Debug, Clone)]
pub struct RefundPolicy {
    pub free_cancel_hours: i64,
    pub early_fee_percent: Decimal,
    pub late_fee_percent: Decimal,
}

pub struct RefundService {
    refund_repo: Arc<dyn RefundRepository>,
    payment_repo: Arc<dyn PaymentRepository>,
    reservation_repo: Arc<dyn ReservationRepository>,
    gateway: Arc<dyn PaymentGateway>,
    settings: Arc<dyn SettingsProvider>,
}

impl RefundService {
    pub fn new(
        refund_repo: Arc<dyn RefundRepository>,
        payment_repo: Arc<dyn PaymentRepository>,
        reservation_repo: Arc<dyn ReservationRepository>,
        gateway: Arc<dyn PaymentGateway>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        Self {
            refund_repo,
            payment_repo,
            reservation_repo,
            gateway,
            settings,
        }
    }

    pub async fn load_policy(&self) -> Result<RefundPolicy> {
        Ok(RefundPolicy {
            free_cancel_hours: self.settings.int(keys::FREE_CANCEL_HOURS).await?,
            early_fee_percent: self.settings.decimal(keys::EARLY_CANCEL_FEE_PERCENT).await?,
            late_fee_percent: self.settings.decimal(keys::LATE_CANCEL_FEE_PERCENT).await?,
        })
    }

    /// Applies the tier policy: free with enough notice, the early fee with a
    /// day or more, the late fee below that. Fee percentages never decrease
    /// as the start time approaches.
    pub fn quote(
        policy: &RefundPolicy,
        original_amount: Decimal,
        starts_at: NaiveDateTime,
        now: NaiveDateTime,
    ) -> RefundQuote {
        let hours_until_start = (starts_at - now).num_hours();

        let (fee_percent, description) = if hours_until_start >= policy.free_cancel_hours {
            (
                Decimal::ZERO,
                format!(
                    "Free cancellation ({}+ hours notice)",
                    policy.free_cancel_hours
                ),
            )
        } else if hours_until_start >= 24 {
            (
                policy.early_fee_percent,
                format!(
                    "Early cancellation fee {}% (24+ hours notice)",
                    policy.early_fee_percent
                ),
            )
        } else {
            (
                policy.late_fee_percent,
                format!(
                    "Late cancellation fee {}% (less than 24 hours notice)",
                    policy.late_fee_percent
                ),
            )
        };

        let cancellation_fee = (original_amount * fee_percent / dec!(100))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

        RefundQuote {
            original_amount,
            fee_percent,
            cancellation_fee,
            refund_amount: original_amount - cancellation_fee,
            policy: description,
        }
    }

    /// Drives a refund for an already-committed cancellation. Runs after the
    /// cancellation has been persisted: a gateway failure here marks the
    /// refund Failed for operator retry and never un-cancels the reservation.
    pub async fn process_refund(
        &self,
        reservation_id: Uuid,
        quote: &RefundQuote,
        reason: &str,
    ) -> Result<Refund> {
        let payment = self
            .payment_repo
            .find_by_reservation(reservation_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("No payment for reservation {}", reservation_id))
            })?;

        if payment.status != PaymentStatus::Paid {
            return Err(AppError::InvalidState(format!(
                "Payment {} is not refundable in status {:?}",
                payment.id, payment.status
            )));
        }

        // One refund record per cancellation attempt. A previous attempt,
        // whatever its state, is retried through retry_refund rather than
        // duplicated here.
        if let Some(existing) = self
            .refund_repo
            .find_by_reservation(reservation_id)
            .await?
            .into_iter()
            .next()
        {
            return Err(AppError::AlreadyProcessed(format!(
                "Refund {} already exists for reservation {} ({:?})",
                existing.id, reservation_id, existing.status
            )));
        }

        let refund = self
            .refund_repo
            .create(Refund {
                id: Uuid::new_v4(),
                payment_id: payment.id,
                reservation_id,
                refund_amount: quote.refund_amount,
                original_amount: quote.original_amount,
                cancellation_fee: quote.cancellation_fee,
                fee_percent: quote.fee_percent,
                reason: reason.to_string(),
                policy: quote.policy.clone(),
                status: RefundStatus::Pending,
                transaction_key: None,
                failure_message: None,
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            })
            .await?;

        self.execute(refund, payment).await
    }

    /// Operator-facing retry for a Failed refund. Re-drives the gateway phase
    /// on the same record; there is deliberately no background retry loop.
    pub async fn retry_refund(&self, refund_id: Uuid) -> Result<Refund> {
        let refund = self
            .refund_repo
            .find_by_id(refund_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Refund not found: {}", refund_id)))?;

        if refund.status != RefundStatus::Failed {
            return Err(AppError::InvalidState(format!(
                "Refund {} is {:?}, only Failed refunds can be retried",
                refund_id, refund.status
            )));
        }

        let payment = self
            .payment_repo
            .find_by_id(refund.payment_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Payment not found: {}", refund.payment_id))
            })?;

        self.execute(refund, payment).await
    }

    /// The gateway phase shared by first attempts and retries: Processing,
    /// gateway cancel, Completed + payment/reservation updates on success,
    /// Failed with the captured message on error.
    async fn execute(&self, refund: Refund, payment: Payment) -> Result<Refund> {
        let refund = self.refund_repo.mark_processing(refund.id).await?;

        let payment_key = match payment.payment_key.as_deref() {
            Some(key) => key,
            None => {
                let refund = self
                    .refund_repo
                    .mark_failed(refund.id, "Payment has no gateway key")
                    .await?;
                return Err(AppError::InvalidState(format!(
                    "Payment {} has no gateway key, refund {} marked Failed",
                    payment.id, refund.id
                )));
            }
        };

        // Full cancellation when the refund covers the whole charge,
        // otherwise a partial cancel for the refunded portion.
        let cancel_amount = if refund.refund_amount >= payment.amount {
            None
        } else {
            Some(refund.refund_amount)
        };

        match self
            .gateway
            .cancel(payment_key, &refund.reason, cancel_amount)
            .await
        {
            Ok(cancellation) => {
                let transaction_key = cancellation.effective_transaction_key();
                let refund = self
                    .refund_repo
                    .mark_completed(refund.id, transaction_key)
                    .await?;

                let canceled_total = payment.canceled_amount + refund.refund_amount;
                let new_status = if canceled_total >= payment.amount {
                    PaymentStatus::Cancelled
                } else {
                    PaymentStatus::PartialCanceled
                };
                self.payment_repo
                    .apply_cancellation(payment.id, canceled_total, new_status)
                    .await?;

                if let Some(reservation) = self
                    .reservation_repo
                    .find_by_id(refund.reservation_id)
                    .await?
                {
                    if reservation.status == ReservationStatus::Cancelled {
                        self.reservation_repo
                            .update_status(reservation.id, ReservationStatus::Refunded)
                            .await?;
                    }
                }

                tracing::info!(
                    refund_id = %refund.id,
                    amount = %refund.refund_amount,
                    "Refund completed"
                );
                Ok(refund)
            }
            Err(err) => {
                // Persist the failure for reconciliation; the payment record
                // stays untouched until an operator retries.
                let refund = self
                    .refund_repo
                    .mark_failed(refund.id, &err.to_string())
                    .await?;
                tracing::error!(
                    refund_id = %refund.id,
                    error = %err,
                    "Refund failed, awaiting operator retry"
                );
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn policy() -> RefundPolicy {
        RefundPolicy {
            free_cancel_hours: 48,
            early_fee_percent: dec!(10),
            late_fee_percent: dec!(30),
        }
    }

    fn quote_at(hours_before: i64, amount: Decimal) -> RefundQuote {
        let now = chrono::NaiveDate::from_ymd_opt(2026, 3, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        RefundService::quote(&policy(), amount, now + Duration::hours(hours_before), now)
    }

    #[test]
    fn free_tier_at_exactly_the_threshold() {
        let quote = quote_at(48, dec!(32000));
        assert_eq!(quote.cancellation_fee, Decimal::ZERO);
        assert_eq!(quote.refund_amount, dec!(32000));
    }

    #[test]
    fn early_tier_at_30_hours() {
        let quote = quote_at(30, dec!(32000));
        assert_eq!(quote.cancellation_fee, dec!(3200));
        assert_eq!(quote.refund_amount, dec!(28800));
    }

    #[test]
    fn late_tier_at_5_hours() {
        let quote = quote_at(5, dec!(32000));
        assert_eq!(quote.cancellation_fee, dec!(9600));
        assert_eq!(quote.refund_amount, dec!(22400));
    }

    #[test]
    fn fee_never_decreases_as_start_approaches() {
        let amount = dec!(32000);
        let fees: Vec<Decimal> = [72, 48, 30, 24, 10, 1]
            .iter()
            .map(|h| quote_at(*h, amount).cancellation_fee)
            .collect();
        for pair in fees.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn refund_plus_fee_equals_original() {
        for hours in [100, 47, 24, 12, 0] {
            let quote = quote_at(hours, dec!(12345.67));
            assert_eq!(
                quote.refund_amount + quote.cancellation_fee,
                quote.original_amount
            );
            assert!(quote.refund_amount <= quote.original_amount);
        }
    }
}
