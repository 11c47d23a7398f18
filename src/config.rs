//! Runtime configuration.
//!
//! Environment variables are the only configuration surface, matching
//! every config struct in the teacher (`OfframpProcessorConfig`,
//! `OnrampProcessorConfig`, `StellarConfig`): a `Default` impl, a
//! `from_env()` constructor that falls back to the default per field,
//! and a `validate()` that catches missing secrets before the daemon
//! starts doing real work.

use std::env;
use std::time::Duration;

use anyhow::{bail, Result};

/// Compile-time default heartbeat interval (spec §6.2): not operator
/// configurable.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 5;
pub const HEARTBEAT_MIN_FLOOR_SECS: u64 = 30;

fn heartbeat_stale_after() -> Duration {
    Duration::from_secs((5 * HEARTBEAT_INTERVAL_SECS).max(HEARTBEAT_MIN_FLOOR_SECS))
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub horizon_url: String,
    pub network_passphrase: String,
    /// Operator-configurable polling interval, spec §6.1 `--interval`.
    pub task_interval_secs: u64,
    pub submit_max_retries: u32,
    pub webhook_timeout_secs: u64,
    pub webhook_hmac_secret: Option<String>,
    pub distribution_seed: Option<String>,
}

impl Config {
    pub fn heartbeat_stale_after(&self) -> Duration {
        heartbeat_stale_after()
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(HEARTBEAT_INTERVAL_SECS)
    }

    pub fn task_interval(&self) -> Duration {
        Duration::from_secs(self.task_interval_secs)
    }

    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            database_url: env::var("DATABASE_URL").unwrap_or(default.database_url),
            horizon_url: env::var("HORIZON_URL").unwrap_or(default.horizon_url),
            network_passphrase: env::var("STELLAR_NETWORK_PASSPHRASE")
                .unwrap_or(default.network_passphrase),
            task_interval_secs: env::var("TASK_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.task_interval_secs),
            submit_max_retries: env::var("SUBMIT_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.submit_max_retries),
            webhook_timeout_secs: env::var("WEBHOOK_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.webhook_timeout_secs),
            webhook_hmac_secret: env::var("WEBHOOK_HMAC_SECRET").ok(),
            distribution_seed: env::var("DISTRIBUTION_ACCOUNT_SEED").ok(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_url.is_empty() {
            bail!("DATABASE_URL must be set");
        }
        if self.horizon_url.is_empty() {
            bail!("HORIZON_URL must be set");
        }
        if self.task_interval_secs == 0 {
            bail!("TASK_INTERVAL_SECS must be greater than zero");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            horizon_url: "https://horizon-testnet.stellar.org".to_string(),
            network_passphrase: "Test SDF Network ; September 2015".to_string(),
            task_interval_secs: 10,
            submit_max_retries: 5,
            webhook_timeout_secs: 5,
            webhook_hmac_secret: None,
            distribution_seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_validation() {
        let mut cfg = Config::default();
        cfg.database_url = "postgres://localhost/test".to_string();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn empty_database_url_fails_validation() {
        let cfg = Config::default();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn heartbeat_floor_is_thirty_seconds() {
        assert_eq!(heartbeat_stale_after(), Duration::from_secs(30));
    }
}
