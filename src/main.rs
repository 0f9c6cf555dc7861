use std::sync::Arc;

use clap::{Parser, Subcommand};
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use slotbook::{
    config::Settings,
    domain::UpdateSettingRequest,
    gateway::{HttpGateway, PaymentGateway},
    service::settings_service::SettingsService,
    service::ServiceContext,
};

#[derive(Parser)]
#[command(name = "slotbook", about = "Reservation lifecycle operations")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending database migrations
    Migrate,
    /// Re-drive a failed refund against the gateway
    RetryRefund {
        refund_id: Uuid,
    },
    /// Print the effective value of a business setting
    GetSetting {
        key: String,
    },
    /// Override a business setting (audited)
    SetSetting {
        key: String,
        value: String,
        #[arg(long)]
        reason: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slotbook=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    sqlx::migrate!("./migrations").run(&db_pool).await?;

    match cli.command {
        Command::Migrate => {
            tracing::info!("Migrations applied");
        }
        Command::RetryRefund { refund_id } => {
            let gateway: Arc<dyn PaymentGateway> = match HttpGateway::from_config(&settings.gateway)
            {
                Some(gateway) => Arc::new(gateway),
                None => anyhow::bail!(
                    "Payment gateway is not configured (gateway.enabled, gateway.base_url, gateway.secret_key)"
                ),
            };
            let context = ServiceContext::new(db_pool, gateway);
            let refund = context.refund_service.retry_refund(refund_id).await?;
            println!(
                "Refund {} is now {:?} (transaction key: {})",
                refund.id,
                refund.status,
                refund.transaction_key.as_deref().unwrap_or("-")
            );
        }
        Command::GetSetting { key } => {
            let service = SettingsService::new(db_pool);
            let value = service.get_value(&key).await?;
            println!("{} = {}", key, value);
        }
        Command::SetSetting { key, value, reason } => {
            let service = SettingsService::new(db_pool);
            let setting = service
                .update_setting(&key, UpdateSettingRequest { value, reason }, None)
                .await?;
            println!("{} = {}", setting.key, setting.value);
        }
    }

    Ok(())
}
