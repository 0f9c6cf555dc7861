mod common;

use rust_decimal_macros::dec;

use slotbook::{
    domain::UpdateSettingRequest,
    error::AppError,
    service::settings_service::{keys, SettingsProvider},
};

#[tokio::test]
async fn defaults_apply_until_overridden() -> anyhow::Result<()> {
    let app = common::setup().await?;
    let settings = &app.ctx.settings_service;

    assert_eq!(settings.int(keys::FREE_CANCEL_HOURS).await?, 48);
    assert_eq!(settings.decimal(keys::EARLY_CANCEL_FEE_PERCENT).await?, dec!(10));
    assert_eq!(settings.decimal(keys::LATE_CANCEL_FEE_PERCENT).await?, dec!(30));
    assert_eq!(settings.decimal(keys::COMMISSION_RATE).await?, dec!(10));
    assert_eq!(settings.decimal(keys::MIN_PAYMENT_AMOUNT).await?, dec!(1000));

    Ok(())
}

#[tokio::test]
async fn unknown_keys_are_not_found() -> anyhow::Result<()> {
    let app = common::setup().await?;

    let err = app
        .ctx
        .settings_service
        .get_value("reservation.no.such.key")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)), "{err:?}");

    Ok(())
}

#[tokio::test]
async fn updates_invalidate_the_cache_and_leave_an_audit_trail() -> anyhow::Result<()> {
    let app = common::setup().await?;
    let settings = &app.ctx.settings_service;

    // Prime the cache with the default.
    assert_eq!(settings.int(keys::FREE_CANCEL_HOURS).await?, 48);

    settings
        .update_setting(
            keys::FREE_CANCEL_HOURS,
            UpdateSettingRequest {
                value: "72".to_string(),
                reason: Some("winter policy".to_string()),
            },
            None,
        )
        .await?;

    // The next read sees the new value, not the cached default.
    assert_eq!(settings.int(keys::FREE_CANCEL_HOURS).await?, 72);

    let (audit_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM settings_audit WHERE setting_key = ?")
            .bind(keys::FREE_CANCEL_HOURS)
            .fetch_one(&app.ctx.db_pool)
            .await?;
    assert_eq!(audit_count, 1);

    Ok(())
}

#[tokio::test]
async fn malformed_values_surface_as_internal_errors() -> anyhow::Result<()> {
    let app = common::setup().await?;
    let settings = &app.ctx.settings_service;

    settings
        .update_setting(
            keys::COMMISSION_RATE,
            UpdateSettingRequest {
                value: "ten percent".to_string(),
                reason: None,
            },
            None,
        )
        .await?;

    let err = settings.decimal(keys::COMMISSION_RATE).await.unwrap_err();
    assert!(matches!(err, AppError::Internal(_)), "{err:?}");

    Ok(())
}
