//! API configuration

use serde::Deserialize;

use core_kernel::Timezone;
use domain_adjudication::AdjudicationSettings;
use domain_insurance::DEFAULT_MAX_RETRIES;

/// API configuration
///
/// Every field can be set through an `API_`-prefixed environment variable,
/// e.g. `API_PORT=9090` or `API_TIMEZONE=Asia/Tehran`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub database_url: String,
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// IANA name of the jurisdiction timezone used for "today"
    pub timezone: String,
    pub ledger_max_retries: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/tpa".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            timezone: "UTC".to_string(),
            ledger_max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from the environment over the defaults
    ///
    /// `DATABASE_URL` is honoured when `API_DATABASE_URL` is not set.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        let mut builder = config::Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", defaults.port)?
            .set_default("jwt_secret", defaults.jwt_secret)?
            .set_default("jwt_expiration_secs", defaults.jwt_expiration_secs)?
            .set_default("database_url", defaults.database_url)?
            .set_default("log_level", defaults.log_level)?
            .set_default("log_json", defaults.log_json)?
            .set_default("timezone", defaults.timezone)?
            .set_default("ledger_max_retries", defaults.ledger_max_retries)?;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            builder = builder.set_default("database_url", url)?;
        }

        builder
            .add_source(config::Environment::with_prefix("API"))
            .build()?
            .try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The configured timezone, or UTC if the name is unknown
    pub fn timezone(&self) -> Timezone {
        Timezone::parse(&self.timezone).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to UTC");
            Timezone::default()
        })
    }

    pub fn adjudication_settings(&self) -> AdjudicationSettings {
        AdjudicationSettings {
            ledger_max_retries: self.ledger_max_retries,
            ..AdjudicationSettings::default()
        }
    }
}
