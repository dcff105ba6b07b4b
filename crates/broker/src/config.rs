use std::time::Duration;

use courier_core::config::{self, ConfigError};
use courier_core::job_kind::JobKind;

/// Durable queue names per job kind, plus the results queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueNames {
    pub install: String,
    pub fine_tune: String,
    pub results: String,
}

impl QueueNames {
    /// Dispatch queue for `kind`. `None` for kinds that are not queued.
    pub fn for_kind(&self, kind: JobKind) -> Option<&str> {
        match kind {
            JobKind::Install => Some(&self.install),
            JobKind::FineTune => Some(&self.fine_tune),
            JobKind::Ingestion => None,
        }
    }

    /// Queues reported by the traffic endpoint.
    pub fn monitored(&self) -> Vec<String> {
        vec![
            self.install.clone(),
            self.fine_tune.clone(),
            self.results.clone(),
        ]
    }
}

impl Default for QueueNames {
    fn default() -> Self {
        Self {
            install: "model_install".to_string(),
            fine_tune: "fine_tune".to_string(),
            results: "inference_results".to_string(),
        }
    }
}

/// Broker connection settings loaded from environment variables.
#[derive(Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub vhost: String,
    /// Base URL of the RabbitMQ management plugin.
    pub management_url: String,
    pub connect_timeout_secs: u64,
    pub queues: QueueNames,
    /// Fanout exchange carrying broadcast events between processes.
    pub broadcast_exchange: String,
}

impl BrokerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                  |
    /// |-----------------------------|--------------------------|
    /// | `AMQP_HOST`                 | `localhost`              |
    /// | `AMQP_PORT`                 | `5672`                   |
    /// | `AMQP_USER`                 | `guest`                  |
    /// | `AMQP_PASSWORD`             | `guest`                  |
    /// | `AMQP_VHOST`                | `/`                      |
    /// | `AMQP_MANAGEMENT_URL`       | `http://localhost:15672` |
    /// | `AMQP_CONNECT_TIMEOUT_SECS` | `5`                      |
    /// | `INSTALL_QUEUE`             | `model_install`          |
    /// | `FINE_TUNE_QUEUE`           | `fine_tune`              |
    /// | `RESULTS_QUEUE`             | `inference_results`      |
    /// | `BROADCAST_EXCHANGE`        | `courier.broadcasts`     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(config::process_env)
    }

    /// Same as [`BrokerConfig::from_env`] with a custom variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = QueueNames::default();
        Ok(Self {
            host: config::string_or(&lookup, "AMQP_HOST", "localhost"),
            port: config::parse_or(&lookup, "AMQP_PORT", 5672)?,
            user: config::string_or(&lookup, "AMQP_USER", "guest"),
            password: config::string_or(&lookup, "AMQP_PASSWORD", "guest"),
            vhost: config::string_or(&lookup, "AMQP_VHOST", "/"),
            management_url: config::string_or(
                &lookup,
                "AMQP_MANAGEMENT_URL",
                "http://localhost:15672",
            )
            .trim_end_matches('/')
            .to_string(),
            connect_timeout_secs: config::parse_or(&lookup, "AMQP_CONNECT_TIMEOUT_SECS", 5)?,
            queues: QueueNames {
                install: config::string_or(&lookup, "INSTALL_QUEUE", &defaults.install),
                fine_tune: config::string_or(&lookup, "FINE_TUNE_QUEUE", &defaults.fine_tune),
                results: config::string_or(&lookup, "RESULTS_QUEUE", &defaults.results),
            },
            broadcast_exchange: config::string_or(
                &lookup,
                "BROADCAST_EXCHANGE",
                "courier.broadcasts",
            ),
        })
    }

    /// `amqp://` URI with credentials and vhost percent-encoded.
    pub fn amqp_uri(&self) -> String {
        format!(
            "amqp://{}:{}@{}:{}/{}",
            urlencoding::encode(&self.user),
            urlencoding::encode(&self.password),
            self.host,
            self.port,
            urlencoding::encode(&self.vhost),
        )
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl std::fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("vhost", &self.vhost)
            .field("management_url", &self.management_url)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("queues", &self.queues)
            .field("broadcast_exchange", &self.broadcast_exchange)
            .finish()
    }
}
