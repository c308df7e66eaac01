//! Configuration management for the order service.
//!
//! Loads configuration from environment variables with defaults. A `.env`
//! file in the working directory is honored when present. Values that are set
//! but cannot be parsed are errors rather than silently replaced by defaults.

use order_framework::tracing::LogFormat;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Which persistence backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            other => Err(format!("expected 'memory' or 'postgres', got '{other}'")),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub store: StoreBackend,
    pub database: DatabaseConfig,
    pub remote: RemoteConfig,
    /// Deadline applied to each inbound request by the demo client.
    pub request_timeout: Duration,
    pub log_format: LogFormat,
}

/// `PostgreSQL` configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    /// disable, prefer, require
    pub ssl_mode: String,
    /// Upper bound of the connection pool
    pub max_connections: u32,
    /// Caps connection establishment and the initial connectivity check
    pub connect_timeout: Duration,
    /// Connections older than this are recycled
    pub max_lifetime: Duration,
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.user, self.password, self.host, self.port, self.name, self.ssl_mode
        )
    }
}

/// Remote collaborators. Without a URL the in-process fixture stands in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub product_service_url: Option<String>,
    pub user_service_url: Option<String>,
    /// Mandatory bound on every outbound call
    pub timeout: Duration,
}

impl Config {
    /// Loads `.env` (if any) and then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            store: parse(&lookup, "STORE_BACKEND", StoreBackend::Memory)?,
            database: DatabaseConfig {
                host: text("DB_HOST", "localhost"),
                port: parse(&lookup, "DB_PORT", 5432)?,
                user: text("DB_USER", "postgres"),
                password: text("DB_PASSWORD", "postgres"),
                name: text("DB_NAME", "orders"),
                ssl_mode: text("DB_SSLMODE", "disable"),
                max_connections: parse(&lookup, "DB_MAX_CONNECTIONS", 25)?,
                connect_timeout: Duration::from_secs(parse(&lookup, "DB_CONNECT_TIMEOUT_SECS", 5)?),
                max_lifetime: Duration::from_secs(parse(&lookup, "DB_MAX_LIFETIME_SECS", 300)?),
            },
            remote: RemoteConfig {
                product_service_url: lookup("PRODUCT_SERVICE_URL").filter(|s| !s.trim().is_empty()),
                user_service_url: lookup("USER_SERVICE_URL").filter(|s| !s.trim().is_empty()),
                timeout: Duration::from_secs(parse(&lookup, "REMOTE_TIMEOUT_SECS", 5)?),
            },
            request_timeout: Duration::from_secs(parse(&lookup, "REQUEST_TIMEOUT_SECS", 10)?),
            log_format: parse(&lookup, "LOG_FORMAT", LogFormat::Compact)?,
        })
    }
}

fn parse<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}
