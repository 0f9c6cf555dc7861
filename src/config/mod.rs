use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GatewayConfig {
    pub base_url: Option<String>,
    pub secret_key: Option<String>,
    #[serde(default)]
    pub enabled: bool,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("database.url", "sqlite://slotbook.db")?
            .set_default("database.max_connections", 10)?
            .set_default("gateway.enabled", false)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Add environment variables (with SLOTBOOK__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("SLOTBOOK").separator("__"))

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://slotbook.db".to_string(),
                max_connections: 10,
            },
            gateway: GatewayConfig {
                base_url: None,
                secret_key: None,
                enabled: false,
            },
        }
    }
}
