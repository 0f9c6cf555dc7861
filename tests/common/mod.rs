// Not every test binary uses every helper.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, NaiveTime, Utc};
use rust_decimal_macros::dec;
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

use slotbook::{
    domain::{
        ConfirmPaymentCommand, CreateReservationCommand, Owner, Payment, RequestPaymentCommand,
        Reservation, Resource, ResourceKind, ResourceRef,
    },
    gateway::FakeGateway,
    service::ServiceContext,
};

pub const PAYMENT_KEY: &str = "pay_test_1";

pub struct TestApp {
    pub ctx: ServiceContext,
    pub gateway: Arc<FakeGateway>,
    pub studio: ResourceRef,
    pub owner_id: Uuid,
    pub user_id: Uuid,
}

pub async fn setup() -> anyhow::Result<TestApp> {
    // Single connection so every query sees the same in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let gateway = Arc::new(FakeGateway::new());
    let ctx = ServiceContext::new(pool, gateway.clone());

    let owner = ctx
        .resource_repo
        .create_owner(Owner {
            id: Uuid::new_v4(),
            name: "Ada's Studio Co".to_string(),
            commission_rate: None,
            created_at: Utc::now(),
        })
        .await?;

    let studio = ctx
        .resource_repo
        .create_resource(Resource {
            id: Uuid::new_v4(),
            kind: ResourceKind::Studio,
            owner_id: owner.id,
            name: "Studio A".to_string(),
            hourly_base_rate: dec!(10000),
            per_person_rate: dec!(2000),
            min_people: 1,
            max_people: 10,
            open_hour: 9,
            close_hour: 22,
            active: true,
            created_at: Utc::now(),
        })
        .await?;

    Ok(TestApp {
        ctx,
        gateway,
        studio: ResourceRef::Studio(studio.id),
        owner_id: owner.id,
        user_id: Uuid::new_v4(),
    })
}

impl TestApp {
    pub fn booking(
        &self,
        days_ahead: i64,
        start_hour: u32,
        end_hour: u32,
        people: i32,
    ) -> CreateReservationCommand {
        CreateReservationCommand {
            resource: self.studio,
            user_id: self.user_id,
            date: (Utc::now() + Duration::days(days_ahead)).date_naive(),
            start_time: NaiveTime::from_hms_opt(start_hour, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end_hour, 0, 0).unwrap(),
            people_count: people,
        }
    }

    /// 2 hours, 3 people, a week out: 10000*2 + 3*2000*2 = 32000.
    pub async fn pending_reservation(&self) -> anyhow::Result<Reservation> {
        Ok(self
            .ctx
            .reservation_service
            .create(self.booking(7, 10, 12, 3))
            .await?)
    }

    /// Runs the full request + confirm flow against the fake gateway.
    pub async fn paid_reservation(&self) -> anyhow::Result<(Reservation, Payment)> {
        let reservation = self.pending_reservation().await?;
        let payload = self
            .ctx
            .payment_service
            .request_payment(RequestPaymentCommand {
                reservation_id: reservation.id,
                amount: reservation.total_amount,
            })
            .await?;
        let payment = self
            .ctx
            .payment_service
            .confirm_payment(ConfirmPaymentCommand {
                payment_key: PAYMENT_KEY.to_string(),
                order_id: payload.order_id,
                amount: payload.amount,
            })
            .await?;
        let reservation = self
            .ctx
            .reservation_service
            .find(reservation.id)
            .await?;
        Ok((reservation, payment))
    }
}
