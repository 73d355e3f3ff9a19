use std::{env, time::Duration};

use log::*;
use mse_common::{helpers::parse_boolean_flag, FeePercent};
use thiserror::Error;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/mse_store.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{name} is not a valid number: {value}")]
    InvalidNumber { name: &'static str, value: String },
    #[error("{name} must be greater than zero")]
    MustBePositive { name: &'static str },
    #[error("{0} is not a valid fee percentage")]
    InvalidFee(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// How long a connection waits on SQLite's write lock before giving up
    pub busy_timeout: Duration,
    /// The platform fee for merchants that are not on a plan
    pub default_fee: FeePercent,
    /// Apply pending schema migrations when the tool connects
    pub auto_migrate: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            default_fee: FeePercent::default(),
            auto_migrate: true,
        }
    }
}

impl EngineConfig {
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from `lookup`. Values that are missing fall back to their defaults; values that are
    /// present but invalid are logged and then fall back too.
    pub fn from_lookup<F>(lookup: F) -> Self
    where F: Fn(&str) -> Option<String> {
        let defaults = Self::default();
        let database_url = lookup("MSE_DATABASE_URL").unwrap_or_else(|| {
            warn!("🪛️ MSE_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}");
            defaults.database_url.clone()
        });
        let max_connections = lookup("MSE_MAX_CONNECTIONS")
            .map(|s| {
                parse_max_connections(&s).unwrap_or_else(|e| {
                    error!("🪛️ {e}. Using the default, {DEFAULT_MAX_CONNECTIONS}, instead.");
                    defaults.max_connections
                })
            })
            .unwrap_or(defaults.max_connections);
        let busy_timeout = lookup("MSE_BUSY_TIMEOUT_MS")
            .map(|s| {
                parse_busy_timeout(&s).unwrap_or_else(|e| {
                    error!("🪛️ {e}. Using the default, {DEFAULT_BUSY_TIMEOUT_MS}ms, instead.");
                    defaults.busy_timeout
                })
            })
            .unwrap_or(defaults.busy_timeout);
        let default_fee = lookup("MSE_DEFAULT_FEE_PERCENT")
            .map(|s| {
                parse_fee(&s).unwrap_or_else(|e| {
                    error!("🪛️ {e}. Using the default, {}, instead.", defaults.default_fee);
                    defaults.default_fee
                })
            })
            .unwrap_or(defaults.default_fee);
        let auto_migrate = parse_boolean_flag(lookup("MSE_AUTO_MIGRATE"), defaults.auto_migrate);
        Self { database_url, max_connections, busy_timeout, default_fee, auto_migrate }
    }
}

fn parse_max_connections(s: &str) -> Result<u32, ConfigError> {
    let n = s
        .trim()
        .parse::<u32>()
        .map_err(|_| ConfigError::InvalidNumber { name: "MSE_MAX_CONNECTIONS", value: s.to_string() })?;
    if n == 0 {
        return Err(ConfigError::MustBePositive { name: "MSE_MAX_CONNECTIONS" });
    }
    Ok(n)
}

fn parse_busy_timeout(s: &str) -> Result<Duration, ConfigError> {
    s.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::InvalidNumber { name: "MSE_BUSY_TIMEOUT_MS", value: s.to_string() })
}

fn parse_fee(s: &str) -> Result<FeePercent, ConfigError> {
    s.parse::<FeePercent>().map_err(|_| ConfigError::InvalidFee(s.to_string()))
}
