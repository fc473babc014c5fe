//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Environment (development, production)
    pub environment: String,

    /// HTTP endpoint receiving events. Events are only logged when unset.
    pub event_sink_url: Option<String>,

    pub event_topic: String,

    /// Limit on a single event delivery attempt
    pub event_send_timeout: Duration,

    /// Publish rounds attempted before giving up on pending events
    pub event_publish_rounds: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"))?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let event_sink_url = env::var("EVENT_SINK_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let event_topic =
            env::var("EVENT_TOPIC").unwrap_or_else(|_| "wallet.transactions".to_string());

        let event_send_timeout_ms: u64 = env::var("EVENT_SEND_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("EVENT_SEND_TIMEOUT_MS"))?;

        let event_publish_rounds = env::var("EVENT_PUBLISH_ROUNDS")
            .unwrap_or_else(|_| "3".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("EVENT_PUBLISH_ROUNDS"))?;

        Ok(Self {
            database_url,
            database_max_connections,
            environment,
            event_sink_url,
            event_topic,
            event_send_timeout: Duration::from_millis(event_send_timeout_ms),
            event_publish_rounds,
        })
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
