//! Consensus constants and node configuration for powledger

use crate::error::ChainError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Target interval between blocks, in milliseconds.
pub const MINE_RATE_MS: u64 = 1000;

/// Difficulty of the genesis block.
pub const INITIAL_DIFFICULTY: i32 = 3;

/// Balance credited to an address that has never sent a transaction.
pub const STARTING_BALANCE: u64 = 1000;

/// Amount paid to the miner of each block.
pub const MINING_REWARD: u64 = 50;

/// Sentinel input address identifying reward transactions.
pub const REWARD_INPUT_ADDRESS: &str = "*authorized-reward*";

/// Rules every node on a network must agree on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusParams {
    #[serde(default = "default_mine_rate_ms")]
    pub mine_rate_ms: u64,
    #[serde(default = "default_starting_balance")]
    pub starting_balance: u64,
    #[serde(default = "default_mining_reward")]
    pub mining_reward: u64,
    /// Reject blocks whose hash does not satisfy their own difficulty.
    #[serde(default = "default_enforce_pow_target")]
    pub enforce_pow_target: bool,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            mine_rate_ms: default_mine_rate_ms(),
            starting_balance: default_starting_balance(),
            mining_reward: default_mining_reward(),
            enforce_pow_target: default_enforce_pow_target(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Re-derive ledger correctness when adopting a peer's chain.
    #[serde(default = "default_validate_transactions")]
    pub validate_transactions: bool,
    /// Capacity of the chain event channel; 0 means unbounded.
    #[serde(default)]
    pub event_capacity: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            validate_transactions: default_validate_transactions(),
            event_capacity: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub consensus: ConsensusParams,
    #[serde(default)]
    pub node: NodeConfig,
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ChainError> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ChainError> {
        if self.consensus.mine_rate_ms == 0 {
            return Err(ChainError::Config(
                "consensus.mine_rate_ms must be greater than zero".to_string(),
            ));
        }
        if self.consensus.mining_reward == 0 {
            return Err(ChainError::Config(
                "consensus.mining_reward must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loads configuration from a TOML file, falling back to defaults when the
/// file does not exist.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    let config_str = fs::read_to_string(path)?;
    Config::from_toml_str(&config_str)
}

fn default_mine_rate_ms() -> u64 {
    MINE_RATE_MS
}

fn default_starting_balance() -> u64 {
    STARTING_BALANCE
}

fn default_mining_reward() -> u64 {
    MINING_REWARD
}

fn default_enforce_pow_target() -> bool {
    true
}

fn default_validate_transactions() -> bool {
    true
}
