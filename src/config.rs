//! Configuration with validation and defaults
//!
//! Loadable from TOML, overridable from the command line, validated before
//! anything starts. The defaults mirror the production deployment: five
//! workers over a fifty-deep queue with a ten second submit timeout.

use crate::errors::ConfigError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KenoConfig {
    pub server: ServerConfig,
    pub pool: PoolConfig,
    pub game: GameConfig,
    /// Development accounts seeded into the ledger at startup. Empty in
    /// production, where accounts come from the real persistence backend.
    pub accounts: Vec<AccountSeed>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5566,
            allowed_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
        }
    }
}

/// Settlement pipeline sizing.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Bounded queue capacity between admission and the workers.
    pub queue_capacity: usize,
    /// Fixed worker count.
    pub workers: usize,
    /// How long a caller waits for its settlement before being released.
    pub submit_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 50,
            workers: 5,
            submit_timeout_ms: 10_000,
        }
    }
}

impl PoolConfig {
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Per-currency minimum stakes. A currency missing here is not accepted
    /// for wagers at all.
    pub minimum_stakes: HashMap<String, Decimal>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            minimum_stakes: HashMap::from([
                ("ETH".to_string(), dec!(0.0001)),
                ("USDT".to_string(), dec!(1.0)),
            ]),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountSeed {
    pub id: u64,
    pub token: String,
    pub balance: Decimal,
}

impl KenoConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        let config: KenoConfig =
            toml::from_str(&raw).map_err(|e| ConfigError::Load(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.workers == 0 {
            return Err(ConfigError::InvalidValue("pool.workers must be > 0".into()));
        }
        if self.pool.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "pool.queue_capacity must be > 0".into(),
            ));
        }
        if self.pool.submit_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "pool.submit_timeout_ms must be > 0".into(),
            ));
        }
        if self.game.minimum_stakes.is_empty() {
            return Err(ConfigError::InvalidValue(
                "game.minimum_stakes must list at least one currency".into(),
            ));
        }
        for (currency, minimum) in &self.game.minimum_stakes {
            if *minimum <= Decimal::ZERO {
                return Err(ConfigError::InvalidValue(format!(
                    "game.minimum_stakes.{} must be > 0",
                    currency
                )));
            }
        }
        for seed in &self.accounts {
            if seed.balance < Decimal::ZERO {
                return Err(ConfigError::InvalidValue(format!(
                    "accounts[{}].balance must be non-negative",
                    seed.id
                )));
            }
        }
        Ok(())
    }
}
