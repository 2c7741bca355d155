//! Error types for powledger

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: u64, available: u64 },
    #[error("Invalid signature from {0}")]
    InvalidSignature(String),
    #[error("Invalid output sum from {address}: outputs total {outputs}, input amount {input}")]
    InvalidOutputSum {
        address: String,
        outputs: u64,
        input: u64,
    },
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Duplicate transaction {0} in block")]
    DuplicateTransaction(String),
    #[error("More than one reward transaction in block {0}")]
    DuplicateReward(usize),
    #[error("Reward transaction {id} pays {amount}, expected {expected}")]
    BadRewardAmount { id: String, amount: u64, expected: u64 },
    #[error("Block {0} does not link to the hash of its predecessor")]
    BrokenHashLink(usize),
    #[error("Block {index} jumps difficulty from {from} to {to}")]
    DifficultyJump { index: usize, from: i32, to: i32 },
    #[error("Stale balance for {address}: input amount {claimed}, ledger balance {actual}")]
    StaleBalance {
        address: String,
        claimed: u64,
        actual: u64,
    },
    #[error("Block {0} hash does not match its contents")]
    HashMismatch(usize),
    #[error("Block {0} hash does not meet its difficulty target")]
    InsufficientWork(usize),
    #[error("Chain does not start with the genesis block")]
    InvalidGenesis,
    #[error("Incoming chain of length {incoming} is not longer than local chain of length {local}")]
    ChainTooShort { incoming: usize, local: usize },
    #[error("Invalid chain: {0}")]
    InvalidChain(Box<ChainError>),
    #[error("Invalid transaction data: {0}")]
    InvalidTransactionData(Box<ChainError>),
    #[error("Mining cancelled")]
    MiningCancelled,
    #[error("Mined block builds on {mined_on}, but the tip is now {tip}")]
    StaleTip { mined_on: String, tip: String },
    #[error("Cryptographic error: {0}")]
    CryptoError(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::Config(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
