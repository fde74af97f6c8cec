use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::models::CredentialsConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub target: CredentialsConfig,
    pub statement: StatementConfig,
    pub catalog: CatalogConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatementConfig {
    /// Delay between operation-state polls
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    /// Schemas discovered concurrently by `get_catalog`
    pub concurrency: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub style: String,
}

impl StatementConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl CatalogConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

impl Default for StatementConfig {
    fn default() -> Self {
        Self { poll_interval_ms: 1000 }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            max_retries: 3,
            backoff_base_ms: 500,
            concurrency: num_cpus::get(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            style: "auto".to_string(),
        }
    }
}

/// Target profile fields and the environment variables that override them
const TARGET_ENV: [(&str, &str); 11] = [
    ("target.host", "LAKEHOUSE_HOST"),
    ("target.token", "LAKEHOUSE_TOKEN"),
    ("target.user", "LAKEHOUSE_USER"),
    ("target.dataplane", "LAKEHOUSE_DATAPLANE"),
    ("target.domain", "LAKEHOUSE_DOMAIN"),
    ("target.lakehouse", "LAKEHOUSE_LAKEHOUSE"),
    ("target.cluster", "LAKEHOUSE_CLUSTER"),
    ("target.catalog", "LAKEHOUSE_CATALOG"),
    ("target.schema", "LAKEHOUSE_SCHEMA"),
    ("target.https", "LAKEHOUSE_HTTPS"),
    ("target.retry_all", "LAKEHOUSE_RETRY_ALL"),
];

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Try to load from .env file first so its values are visible below
        let _ = dotenv::dotenv();

        let defaults = CatalogConfig::default();
        let mut builder = config::Config::builder()
            .set_default("statement.poll_interval_ms", 1000)?
            .set_default("catalog.request_timeout_secs", defaults.request_timeout_secs as i64)?
            .set_default("catalog.max_retries", defaults.max_retries as i64)?
            .set_default("catalog.backoff_base_ms", defaults.backoff_base_ms as i64)?
            .set_default("catalog.concurrency", defaults.concurrency as i64)?
            .set_default("logging.level", "info")?
            .set_default("logging.style", "auto")?;

        for (key, var) in TARGET_ENV {
            if let Ok(value) = env::var(var) {
                builder = builder.set_override(key, value)?;
            }
        }

        if let Ok(port) = env::var("LAKEHOUSE_PORT") {
            let port = port
                .parse::<u16>()
                .map_err(|e| config::ConfigError::Message(format!("Invalid LAKEHOUSE_PORT: {}", e)))?;
            builder = builder.set_override("target.port", port as i64)?;
        }

        if let Ok(retries) = env::var("LAKEHOUSE_CONNECT_RETRIES") {
            let retries = retries.parse::<u32>().map_err(|e| {
                config::ConfigError::Message(format!("Invalid LAKEHOUSE_CONNECT_RETRIES: {}", e))
            })?;
            builder = builder.set_override("target.connect_retries", retries as i64)?;
        }

        if let Ok(timeout) = env::var("LAKEHOUSE_CONNECT_TIMEOUT") {
            let timeout = timeout.parse::<u64>().map_err(|e| {
                config::ConfigError::Message(format!("Invalid LAKEHOUSE_CONNECT_TIMEOUT: {}", e))
            })?;
            builder = builder.set_override("target.connect_timeout", timeout as i64)?;
        }

        if let Ok(interval) = env::var("LAKEHOUSE_POLL_INTERVAL_MS") {
            builder = builder.set_override("statement.poll_interval_ms", interval.parse::<i64>().unwrap_or(1000))?;
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            builder = builder.set_override("logging.level", log_level)?;
        }

        if let Ok(log_style) = env::var("RUST_LOG_STYLE") {
            builder = builder.set_override("logging.style", log_style)?;
        }

        builder.build()?.try_deserialize()
    }
}
