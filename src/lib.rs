//! powledger - A minimal proof-of-work ledger with account-style balances
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Blockchain
//! - [`blockchain`] - Blocks, chain validation and longest-chain replacement
//! - [`transaction`] - Signed transfers and miner rewards
//! - [`mempool`] - Pending transaction pool
//!
//! ## Consensus
//! - [`miner`] - Proof-of-work mining and difficulty adjustment
//!
//! ## Cryptography
//! - [`crypto`] - Hashing, keys and signatures (secp256k1)
//!
//! ## State Management
//! - [`wallet`] - Wallet identity and balance replay
//!
//! ## Integration
//! - [`node`] - Node facade serializing chain and pool mutations
//!
//! ## Configuration & Utilities
//! - [`config`] - Consensus constants and configuration
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Blockchain
// ============================================================================
pub mod blockchain;
pub mod mempool;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod miner;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// State Management
// ============================================================================
pub mod wallet;

// ============================================================================
// Integration
// ============================================================================
pub mod node;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
