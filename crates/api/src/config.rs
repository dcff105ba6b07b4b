use std::time::Duration;

use courier_broker::BrokerConfig;
use courier_core::config::{self, ConfigError};

/// Settings for the synchronous ingestion service.
#[derive(Clone)]
pub struct IngestionConfig {
    /// Endpoint receiving ingestion requests.
    pub url: String,
    /// Sent as `X-API-Key`.
    pub api_key: String,
    /// Request timeout in seconds (default: `60`).
    pub timeout_secs: u64,
}

impl IngestionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl std::fmt::Debug for IngestionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionConfig")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Server configuration loaded from environment variables.
///
/// Network settings have defaults suitable for local development. The database
/// URL, signing secret, and ingestion endpoint must be provided.
#[derive(Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    pub database_url: String,
    /// Shared secret for work-item and webhook signatures.
    pub signing_secret: String,
    pub ingestion: IngestionConfig,
    pub broker: BrokerConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                  | Default                 |
    /// |--------------------------|-------------------------|
    /// | `HOST`                   | `0.0.0.0`               |
    /// | `PORT`                   | `3000`                  |
    /// | `CORS_ORIGINS`           | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                    |
    /// | `DATABASE_URL`           | required                |
    /// | `SIGNING_SECRET`         | required                |
    /// | `INGESTION_URL`          | required                |
    /// | `INGESTION_API_KEY`      | required                |
    /// | `INGESTION_TIMEOUT_SECS` | `60`                    |
    ///
    /// Broker variables are documented on [`BrokerConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(config::process_env)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            host: config::string_or(&lookup, "HOST", "0.0.0.0"),
            port: config::parse_or(&lookup, "PORT", 3000)?,
            cors_origins: config::list_or(&lookup, "CORS_ORIGINS", "http://localhost:5173"),
            request_timeout_secs: config::parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30)?,
            database_url: config::required(&lookup, "DATABASE_URL")?,
            signing_secret: config::required(&lookup, "SIGNING_SECRET")?,
            ingestion: IngestionConfig {
                url: config::required(&lookup, "INGESTION_URL")?,
                api_key: config::required(&lookup, "INGESTION_API_KEY")?,
                timeout_secs: config::parse_or(&lookup, "INGESTION_TIMEOUT_SECS", 60)?,
            },
            broker: BrokerConfig::from_lookup(&lookup)?,
        })
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("cors_origins", &self.cors_origins)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("signing_secret", &"<redacted>")
            .field("ingestion", &self.ingestion)
            .field("broker", &self.broker)
            .finish_non_exhaustive()
    }
}
