use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::*;
use crate::error::Result;

pub mod resource_repository;
pub mod reservation_repository;
pub mod payment_repository;
pub mod refund_repository;
pub mod settlement_repository;

pub use resource_repository::SqliteResourceRepository;
pub use reservation_repository::SqliteReservationRepository;
pub use payment_repository::SqlitePaymentRepository;
pub use refund_repository::SqliteRefundRepository;
pub use settlement_repository::SqliteSettlementRepository;

#[async_trait]
pub trait ResourceRepository: Send + Sync {
    async fn create_owner(&self, owner: Owner) -> Result<Owner>;
    async fn find_owner(&self, id: Uuid) -> Result<Option<Owner>>;
    async fn create_resource(&self, resource: Resource) -> Result<Resource>;
    async fn find_resource(&self, resource: ResourceRef) -> Result<Option<Resource>>;
}

#[async_trait]
pub trait ReservationRepository: Send + Sync {
    async fn create(&self, reservation: Reservation) -> Result<Reservation>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Reservation>>;
    async fn find_confirmed_for_date(
        &self,
        resource_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Reservation>>;
    async fn update_status(&self, id: Uuid, status: ReservationStatus) -> Result<Reservation>;
    async fn mark_cancelled(
        &self,
        id: Uuid,
        reason: &str,
        cancelled_at: DateTime<Utc>,
    ) -> Result<Reservation>;
    /// Inserts one slot row per booked hour. The unique index on
    /// (resource_id, slot_date, slot_hour) turns a racing claim into Conflict.
    async fn claim_slots(&self, reservation: &Reservation) -> Result<()>;
    async fn release_slots(&self, reservation_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create(&self, payment: Payment) -> Result<Payment>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>>;
    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<Payment>>;
    async fn find_by_reservation(&self, reservation_id: Uuid) -> Result<Option<Payment>>;
    async fn mark_paid(
        &self,
        id: Uuid,
        payment_key: &str,
        method: Option<&str>,
        approved_at: DateTime<Utc>,
    ) -> Result<Payment>;
    async fn mark_failed(&self, id: Uuid, code: &str, reason: &str) -> Result<Payment>;
    async fn apply_cancellation(
        &self,
        id: Uuid,
        canceled_amount: Decimal,
        status: PaymentStatus,
    ) -> Result<Payment>;
}

#[async_trait]
pub trait RefundRepository: Send + Sync {
    async fn create(&self, refund: Refund) -> Result<Refund>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Refund>>;
    async fn find_by_reservation(&self, reservation_id: Uuid) -> Result<Vec<Refund>>;
    async fn mark_processing(&self, id: Uuid) -> Result<Refund>;
    async fn mark_completed(&self, id: Uuid, transaction_key: Option<&str>) -> Result<Refund>;
    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<Refund>;
}

#[async_trait]
pub trait SettlementRepository: Send + Sync {
    async fn create(&self, settlement: Settlement) -> Result<Settlement>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Settlement>>;
    async fn find_by_payment(&self, payment_id: Uuid) -> Result<Option<Settlement>>;
    async fn update_status(&self, id: Uuid, status: SettlementStatus) -> Result<Settlement>;
}
