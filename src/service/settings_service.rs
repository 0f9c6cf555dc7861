use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::RwLock;
use uuid::Uuid;

use crate::{
    domain::{AppSetting, UpdateSettingRequest},
    error::{AppError, Result},
};

/// Setting keys the lifecycle services read.
pub mod keys {
    pub const FREE_CANCEL_HOURS: &str = "reservation.free.cancel.hours";
    pub const EARLY_CANCEL_FEE_PERCENT: &str = "reservation.early.cancel.fee.percent";
    pub const LATE_CANCEL_FEE_PERCENT: &str = "reservation.late.cancel.fee.percent";
    pub const COMMISSION_RATE: &str = "platform.commission.rate";
    pub const MIN_PAYMENT_AMOUNT: &str = "payment.min.amount";
    pub const MAX_ADVANCE_DAYS: &str = "reservation.max.advance.days";
    pub const MAX_DURATION_HOURS: &str = "reservation.max.duration.hours";
}

/// Compiled-in defaults, used until an admin overrides a key.
const DEFAULTS: &[(&str, &str)] = &[
    (keys::FREE_CANCEL_HOURS, "48"),
    (keys::EARLY_CANCEL_FEE_PERCENT, "10"),
    (keys::LATE_CANCEL_FEE_PERCENT, "30"),
    (keys::COMMISSION_RATE, "10"),
    (keys::MIN_PAYMENT_AMOUNT, "1000"),
    (keys::MAX_ADVANCE_DAYS, "90"),
    (keys::MAX_DURATION_HOURS, "8"),
];

/// Typed access to tunable business parameters. Injected into each lifecycle
/// service so none of them reach for a global settings bean.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn text(&self, key: &str) -> Result<String>;
    async fn int(&self, key: &str) -> Result<i64>;
    async fn decimal(&self, key: &str) -> Result<Decimal>;
}

#[derive(FromRow)]
struct SettingRow {
    key: String,
    value: String,
    description: Option<String>,
    updated_by: Option<String>,
    updated_at: NaiveDateTime,
}

pub struct SettingsService {
    pool: SqlitePool,
    cache: RwLock<HashMap<String, String>>,
}

impl SettingsService {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn default_for(key: &str) -> Option<&'static str> {
        DEFAULTS
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }

    fn row_to_setting(row: SettingRow) -> AppSetting {
        AppSetting {
            key: row.key,
            value: row.value,
            description: row.description,
            updated_by: row.updated_by.and_then(|s| Uuid::parse_str(&s).ok()),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        }
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<AppSetting>> {
        let row = sqlx::query_as::<_, SettingRow>(
            r#"
            SELECT key, value, description, updated_by, updated_at
            FROM app_settings
            WHERE key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Self::row_to_setting))
    }

    pub async fn get_value(&self, key: &str) -> Result<String> {
        if let Some(cached) = self.cache.read().unwrap().get(key) {
            return Ok(cached.clone());
        }

        let value = match self.get_setting(key).await? {
            Some(setting) => setting.value,
            None => Self::default_for(key)
                .map(str::to_string)
                .ok_or_else(|| AppError::NotFound(format!("Setting not found: {}", key)))?,
        };

        self.cache
            .write()
            .unwrap()
            .insert(key.to_string(), value.clone());
        Ok(value)
    }

    /// Upserts a setting, writes an audit row, and invalidates the cache so
    /// the next read sees the new value.
    pub async fn update_setting(
        &self,
        key: &str,
        request: UpdateSettingRequest,
        updated_by: Option<Uuid>,
    ) -> Result<AppSetting> {
        let old_value = match self.get_setting(key).await? {
            Some(setting) => Some(setting.value),
            None => Self::default_for(key).map(str::to_string),
        };

        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            INSERT INTO app_settings (key, value, updated_by, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE
            SET value = excluded.value,
                updated_by = excluded.updated_by,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(&request.value)
        .bind(updated_by.map(|id| id.to_string()))
        .bind(now)
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO settings_audit (id, setting_key, old_value, new_value, changed_by, reason)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(key)
        .bind(old_value)
        .bind(&request.value)
        .bind(updated_by.map(|id| id.to_string()))
        .bind(&request.reason)
        .execute(&self.pool)
        .await?;

        self.cache.write().unwrap().remove(key);

        self.get_setting(key)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated setting".to_string()))
    }
}

#[async_trait]
impl SettingsProvider for SettingsService {
    async fn text(&self, key: &str) -> Result<String> {
        self.get_value(key).await
    }

    async fn int(&self, key: &str) -> Result<i64> {
        let value = self.get_value(key).await?;
        value
            .parse()
            .map_err(|_| AppError::Internal(format!("Invalid integer value for {}: {}", key, value)))
    }

    async fn decimal(&self, key: &str) -> Result<Decimal> {
        let value = self.get_value(key).await?;
        Decimal::from_str(&value)
            .map_err(|_| AppError::Internal(format!("Invalid decimal value for {}: {}", key, value)))
    }
}
