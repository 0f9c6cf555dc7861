pub mod settings_service;
pub mod reservation_service;
pub mod payment_service;
pub mod refund_service;
pub mod settlement_service;

use std::sync::Arc;
use sqlx::SqlitePool;

use crate::gateway::PaymentGateway;
use crate::repository::*;
use payment_service::PaymentService;
use refund_service::RefundService;
use reservation_service::ReservationService;
use settings_service::{SettingsProvider, SettingsService};
use settlement_service::SettlementService;

pub struct ServiceContext {
    pub resource_repo: Arc<dyn ResourceRepository>,
    pub reservation_repo: Arc<dyn ReservationRepository>,
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub refund_repo: Arc<dyn RefundRepository>,
    pub settlement_repo: Arc<dyn SettlementRepository>,
    pub settings_service: Arc<SettingsService>,
    pub reservation_service: Arc<ReservationService>,
    pub payment_service: Arc<PaymentService>,
    pub refund_service: Arc<RefundService>,
    pub settlement_service: Arc<SettlementService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(db_pool: SqlitePool, gateway: Arc<dyn PaymentGateway>) -> Self {
        let resource_repo: Arc<dyn ResourceRepository> =
            Arc::new(SqliteResourceRepository::new(db_pool.clone()));
        let reservation_repo: Arc<dyn ReservationRepository> =
            Arc::new(SqliteReservationRepository::new(db_pool.clone()));
        let payment_repo: Arc<dyn PaymentRepository> =
            Arc::new(SqlitePaymentRepository::new(db_pool.clone()));
        let refund_repo: Arc<dyn RefundRepository> =
            Arc::new(SqliteRefundRepository::new(db_pool.clone()));
        let settlement_repo: Arc<dyn SettlementRepository> =
            Arc::new(SqliteSettlementRepository::new(db_pool.clone()));

        let settings_service = Arc::new(SettingsService::new(db_pool.clone()));
        let settings: Arc<dyn SettingsProvider> = settings_service.clone();

        let refund_service = Arc::new(RefundService::new(
            refund_repo.clone(),
            payment_repo.clone(),
            reservation_repo.clone(),
            gateway.clone(),
            settings.clone(),
        ));
        let reservation_service = Arc::new(ReservationService::new(
            reservation_repo.clone(),
            resource_repo.clone(),
            refund_service.clone(),
            settings.clone(),
        ));
        let settlement_service = Arc::new(SettlementService::new(
            settlement_repo.clone(),
            reservation_repo.clone(),
            resource_repo.clone(),
            settings.clone(),
        ));
        let payment_service = Arc::new(PaymentService::new(
            payment_repo.clone(),
            reservation_repo.clone(),
            reservation_service.clone(),
            settlement_service.clone(),
            gateway,
        ));

        Self {
            resource_repo,
            reservation_repo,
            payment_repo,
            refund_repo,
            settlement_repo,
            settings_service,
            reservation_service,
            payment_service,
            refund_service,
            settlement_service,
            db_pool,
        }
    }
}
