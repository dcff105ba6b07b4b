use std::time::Duration;

use courier_broker::BrokerConfig;
use courier_core::config::{self, ConfigError};

/// Prefetch, retry and timeout tuning for the results consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerConfig {
    /// Unacknowledged deliveries the broker may push at once.
    pub prefetch: u16,
    /// Requeues allowed for a transiently failing message.
    pub max_retries: u32,
    /// Upper bound on processing one delivery.
    pub timeout_secs: u64,
}

impl ConsumerConfig {
    /// | Env Var                 | Default |
    /// |-------------------------|---------|
    /// | `CONSUMER_PREFETCH`     | `1`     |
    /// | `CONSUMER_MAX_RETRIES`  | `3`     |
    /// | `CONSUMER_TIMEOUT_SECS` | `30`    |
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefetch: u16 = config::parse_or(lookup, "CONSUMER_PREFETCH", 1)?;
        if prefetch == 0 {
            return Err(ConfigError::Invalid {
                var: "CONSUMER_PREFETCH",
                value: "0".to_string(),
            });
        }
        Ok(Self {
            prefetch,
            max_retries: config::parse_or(lookup, "CONSUMER_MAX_RETRIES", 3)?,
            timeout_secs: config::parse_or(lookup, "CONSUMER_TIMEOUT_SECS", 30)?,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            prefetch: 1,
            max_retries: 3,
            timeout_secs: 30,
        }
    }
}

/// Everything the worker binary needs.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub broker: BrokerConfig,
    pub consumer: ConsumerConfig,
}

impl WorkerConfig {
    /// `DATABASE_URL` is required; broker and consumer settings have defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(config::process_env)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            database_url: config::required(&lookup, "DATABASE_URL")?,
            broker: BrokerConfig::from_lookup(&lookup)?,
            consumer: ConsumerConfig::from_lookup(&lookup)?,
        })
    }
}
