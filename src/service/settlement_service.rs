use chrono::Utc;
use rust_decimal::RoundingStrategy;
use rust_decimal_macros::dec;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{Payment, PaymentStatus, Settlement, SettlementStatus},
    error::{AppError, Result},
    repository::{ReservationRepository, ResourceRepository, SettlementRepository},
    service::settings_service::{keys, SettingsProvider},
};

pub struct SettlementService {
    settlement_repo: Arc<dyn SettlementRepository>,
    reservation_repo: Arc<dyn ReservationRepository>,
    resource_repo: Arc<dyn ResourceRepository>,
    settings: Arc<dyn SettingsProvider>,
}

impl SettlementService {
    pub fn new(
        settlement_repo: Arc<dyn SettlementRepository>,
        reservation_repo: Arc<dyn ReservationRepository>,
        resource_repo: Arc<dyn ResourceRepository>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        Self {
            settlement_repo,
            reservation_repo,
            resource_repo,
            settings,
        }
    }

    /// Splits a confirmed payment between platform commission, owner payout
    /// and withholding tax. The beneficiary is the owner of the one resource
    /// the reservation references.
    ///
    /// The settlement is persisted as Paid right away; no escrow or payout
    /// run is modeled yet.
    pub async fn create_settlement(&self, payment: &Payment) -> Result<Settlement> {
        if payment.status != PaymentStatus::Paid {
            return Err(AppError::InvalidState(format!(
                "Payment {} is not settled in status {:?}",
                payment.id, payment.status
            )));
        }

        let reservation = self
            .reservation_repo
            .find_by_id(payment.reservation_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Reservation not found: {}", payment.reservation_id))
            })?;

        let resource_ref = reservation.resource_ref()?;
        let resource = self
            .resource_repo
            .find_resource(resource_ref)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Resource not found: {}", resource_ref.id()))
            })?;
        let owner = self
            .resource_repo
            .find_owner(resource.owner_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Owner not found: {}", resource.owner_id))
            })?;

        let commission_rate = match owner.commission_rate {
            Some(rate) => rate,
            None => self.settings.decimal(keys::COMMISSION_RATE).await?,
        };

        let total = payment.amount;
        let platform_fee = (total * commission_rate / dec!(100))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let payout_amount = total - platform_fee;
        let tax_amount = (payout_amount * dec!(3.3) / dec!(100))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

        let settlement = self
            .settlement_repo
            .create(Settlement {
                id: Uuid::new_v4(),
                payment_id: payment.id,
                owner_id: owner.id,
                total_amount: total,
                commission_rate,
                platform_fee,
                payout_amount,
                tax_amount,
                status: SettlementStatus::Paid,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await?;

        tracing::info!(
            settlement_id = %settlement.id,
            owner_id = %owner.id,
            payout = %settlement.payout_amount,
            "Settlement created"
        );
        Ok(settlement)
    }

    async fn find(&self, id: Uuid) -> Result<Settlement> {
        self.settlement_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Settlement not found: {}", id)))
    }

    /// Pays out a pending settlement. Already-paid or held settlements
    /// cannot be withdrawn.
    pub async fn withdraw(&self, id: Uuid) -> Result<Settlement> {
        let settlement = self.find(id).await?;
        if settlement.status != SettlementStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "Settlement {} cannot be withdrawn from {:?}",
                id, settlement.status
            )));
        }
        self.settlement_repo
            .update_status(id, SettlementStatus::Paid)
            .await
    }

    /// Puts a pending settlement on hold, e.g. during a dispute.
    pub async fn hold(&self, id: Uuid) -> Result<Settlement> {
        let settlement = self.find(id).await?;
        if settlement.status != SettlementStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "Settlement {} cannot be held from {:?}",
                id, settlement.status
            )));
        }
        self.settlement_repo
            .update_status(id, SettlementStatus::Hold)
            .await
    }

    /// Releases a held settlement back into the payout queue.
    pub async fn approve(&self, id: Uuid) -> Result<Settlement> {
        let settlement = self.find(id).await?;
        if settlement.status != SettlementStatus::Hold {
            return Err(AppError::InvalidState(format!(
                "Settlement {} cannot be approved from {:?}",
                id, settlement.status
            )));
        }
        self.settlement_repo
            .update_status(id, SettlementStatus::Pending)
            .await
    }
}
