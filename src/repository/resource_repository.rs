use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

use crate::{
    domain::{Owner, Resource, ResourceKind, ResourceRef},
    error::{AppError, Result},
    repository::ResourceRepository,
};

#[derive(FromRow)]
struct OwnerRow {
    id: String,
    name: String,
    commission_rate: Option<String>,
    created_at: NaiveDateTime,
}

#[derive(FromRow)]
struct ResourceRow {
    id: String,
    kind: String,
    owner_id: String,
    name: String,
    hourly_base_rate: String,
    per_person_rate: String,
    min_people: i32,
    max_people: i32,
    open_hour: i32,
    close_hour: i32,
    active: bool,
    created_at: NaiveDateTime,
}

pub struct SqliteResourceRepository {
    pool: SqlitePool,
}

impl SqliteResourceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_owner(row: OwnerRow) -> Result<Owner> {
        Ok(Owner {
            id: parse_uuid(&row.id)?,
            name: row.name,
            commission_rate: row
                .commission_rate
                .as_deref()
                .map(parse_decimal)
                .transpose()?,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }

    fn row_to_resource(row: ResourceRow) -> Result<Resource> {
        Ok(Resource {
            id: parse_uuid(&row.id)?,
            kind: parse_kind(&row.kind)?,
            owner_id: parse_uuid(&row.owner_id)?,
            name: row.name,
            hourly_base_rate: parse_decimal(&row.hourly_base_rate)?,
            per_person_rate: parse_decimal(&row.per_person_rate)?,
            min_people: row.min_people,
            max_people: row.max_people,
            open_hour: row.open_hour as u32,
            close_hour: row.close_hour as u32,
            active: row.active,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    Decimal::from_str(s).map_err(|e| AppError::Database(e.to_string()))
}

fn parse_kind(s: &str) -> Result<ResourceKind> {
    match s {
        "Studio" => Ok(ResourceKind::Studio),
        "Workshop" => Ok(ResourceKind::Workshop),
        _ => Err(AppError::Database(format!("Invalid resource kind: {}", s))),
    }
}

fn kind_to_str(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Studio => "Studio",
        ResourceKind::Workshop => "Workshop",
    }
}

#[async_trait]
impl ResourceRepository for SqliteResourceRepository {
    async fn create_owner(&self, owner: Owner) -> Result<Owner> {
        sqlx::query(
            r#"
            INSERT INTO owners (id, name, commission_rate, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(owner.id.to_string())
        .bind(&owner.name)
        .bind(owner.commission_rate.map(|r| r.to_string()))
        .bind(owner.created_at.naive_utc())
        .execute(&self.pool)
        .await?;

        self.find_owner(owner.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created owner".to_string())
        })
    }

    async fn find_owner(&self, id: Uuid) -> Result<Option<Owner>> {
        let row = sqlx::query_as::<_, OwnerRow>(
            r#"
            SELECT id, name, commission_rate, created_at
            FROM owners
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(Self::row_to_owner(r)?)),
            None => Ok(None),
        }
    }

    async fn create_resource(&self, resource: Resource) -> Result<Resource> {
        sqlx::query(
            r#"
            INSERT INTO resources (
                id, kind, owner_id, name, hourly_base_rate, per_person_rate,
                min_people, max_people, open_hour, close_hour, active, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(resource.id.to_string())
        .bind(kind_to_str(resource.kind))
        .bind(resource.owner_id.to_string())
        .bind(&resource.name)
        .bind(resource.hourly_base_rate.to_string())
        .bind(resource.per_person_rate.to_string())
        .bind(resource.min_people)
        .bind(resource.max_people)
        .bind(resource.open_hour as i32)
        .bind(resource.close_hour as i32)
        .bind(resource.active)
        .bind(resource.created_at.naive_utc())
        .execute(&self.pool)
        .await?;

        let re = match resource.kind {
            ResourceKind::Studio => ResourceRef::Studio(resource.id),
            ResourceKind::Workshop => ResourceRef::Workshop(resource.id),
        };
        self.find_resource(re).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created resource".to_string())
        })
    }

    async fn find_resource(&self, resource: ResourceRef) -> Result<Option<Resource>> {
        let kind = match resource {
            ResourceRef::Studio(_) => "Studio",
            ResourceRef::Workshop(_) => "Workshop",
        };
        let row = sqlx::query_as::<_, ResourceRow>(
            r#"
            SELECT id, kind, owner_id, name, hourly_base_rate, per_person_rate,
                   min_people, max_people, open_hour, close_hour, active, created_at
            FROM resources
            WHERE id = ? AND kind = ?
            "#,
        )
        .bind(resource.id().to_string())
        .bind(kind)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(Self::row_to_resource(r)?)),
            None => Ok(None),
        }
    }
}
