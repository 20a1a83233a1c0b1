//! Configuration loading and representation.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `STOCKMASTER_LOCK_TIMEOUT_MS` | `2000` | longest wait for product locks before `Contention` |
//! | `STOCKMASTER_LOG_FORMAT` | `json` | `json` or `plain` |

use std::time::Duration;

use thiserror::Error;

use stockmaster_observability::{LogConfig, LogFormat, UnknownLogFormat};

pub const LOCK_TIMEOUT_VAR: &str = "STOCKMASTER_LOCK_TIMEOUT_MS";
pub const LOG_FORMAT_VAR: &str = "STOCKMASTER_LOG_FORMAT";

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(2000);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("STOCKMASTER_LOCK_TIMEOUT_MS must be a positive number of milliseconds, got '{0}'")]
    InvalidLockTimeout(String),

    #[error("STOCKMASTER_LOG_FORMAT: {0}")]
    LogFormat(#[from] UnknownLogFormat),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockConfig {
    pub lock_timeout: Duration,
    pub log: LogConfig,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            log: LogConfig::default(),
        }
    }
}

impl StockConfig {
    /// Load from the process environment; unset variables take their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(LOCK_TIMEOUT_VAR) {
            let millis: u64 = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidLockTimeout(raw.clone()))?;
            if millis == 0 {
                return Err(ConfigError::InvalidLockTimeout(raw));
            }
            config.lock_timeout = Duration::from_millis(millis);
        }

        if let Some(raw) = lookup(LOG_FORMAT_VAR) {
            config.log.format = raw.parse::<LogFormat>()?;
        }

        Ok(config)
    }
}
