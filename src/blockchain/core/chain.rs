use crate::config::{ConsensusParams, INITIAL_DIFFICULTY};
use crate::crypto::{crypto_hash, SigningContext};
use crate::error::ChainError;
use crate::miner::{is_hash_valid, mine_block};
use crate::transaction::Transaction;
use crate::wallet::calculate_balance;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use super::validation::{check_block_link, check_chain};

pub const GENESIS_TIMESTAMP: u64 = 1;
pub const GENESIS_LAST_HASH: &str = "genesis-last-hash";
pub const GENESIS_HASH: &str = "genesis-hash";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub last_hash: String,
    pub hash: String,
    pub data: Vec<Transaction>,
    pub nonce: u64,
    /// Required leading zero bits of `hash`.
    pub difficulty: i32,
}

impl Block {
    /// The fixed first block, identical on every node and never mined.
    pub fn genesis() -> Self {
        Block {
            timestamp: GENESIS_TIMESTAMP,
            last_hash: GENESIS_LAST_HASH.to_string(),
            hash: GENESIS_HASH.to_string(),
            data: Vec::new(),
            nonce: 0,
            difficulty: INITIAL_DIFFICULTY,
        }
    }

    /// Hash of the sealed fields, always in the order
    /// `(timestamp, last_hash, data, nonce, difficulty)`.
    pub fn compute_hash(
        timestamp: u64,
        last_hash: &str,
        data: &[Transaction],
        nonce: u64,
        difficulty: i32,
    ) -> Result<String, ChainError> {
        crypto_hash(&(timestamp, last_hash, data, nonce, difficulty))
    }

    pub fn recompute_hash(&self) -> Result<String, ChainError> {
        Self::compute_hash(
            self.timestamp,
            &self.last_hash,
            &self.data,
            self.nonce,
            self.difficulty,
        )
    }

    pub fn meets_target(&self) -> bool {
        is_hash_valid(&self.hash, self.difficulty)
    }

    /// Mines a block on top of `last_block`. Runs until a nonce is found.
    pub fn mine(
        last_block: &Block,
        data: Vec<Transaction>,
        params: &ConsensusParams,
    ) -> Result<Block, ChainError> {
        mine_block(last_block, data, params, &AtomicBool::new(false))
    }
}

/// Notification emitted after a successful chain mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    Replaced {
        old_length: usize,
        new_length: usize,
        tip_hash: String,
    },
    BlockMined {
        index: usize,
        hash: String,
        transactions: usize,
    },
}

/// The node-local chain. Index 0 is always the genesis block.
///
/// No internal locking: callers serialize `add_block`, `append_mined` and
/// `replace_chain`.
#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
    params: ConsensusParams,
    ctx: Arc<SigningContext>,
}

impl Blockchain {
    pub fn new(ctx: Arc<SigningContext>, params: ConsensusParams) -> Self {
        Blockchain {
            blocks: vec![Block::genesis()],
            params,
            ctx,
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: the genesis block is never removed.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn tip(&self) -> &Block {
        // non-empty: constructed with genesis, only replaced by longer chains
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    pub fn signing_context(&self) -> &Arc<SigningContext> {
        &self.ctx
    }

    /// Mines `data` on top of the tip and appends the result.
    pub fn add_block(&mut self, data: Vec<Transaction>) -> Result<&Block, ChainError> {
        self.add_block_cancellable(data, &AtomicBool::new(false))
    }

    /// Like [`Blockchain::add_block`], but gives up with
    /// [`ChainError::MiningCancelled`] once `cancel` is set.
    pub fn add_block_cancellable(
        &mut self,
        data: Vec<Transaction>,
        cancel: &AtomicBool,
    ) -> Result<&Block, ChainError> {
        let block = mine_block(self.tip(), data, &self.params, cancel)?;
        self.blocks.push(block);
        Ok(self.tip())
    }

    /// Appends a block mined elsewhere against a snapshot of the tip.
    pub fn append_mined(&mut self, block: Block) -> Result<ChainEvent, ChainError> {
        let tip = self.tip();
        if block.last_hash != tip.hash {
            return Err(ChainError::StaleTip {
                mined_on: block.last_hash,
                tip: tip.hash.clone(),
            });
        }
        let index = self.blocks.len();
        check_block_link(tip, &block, index, &self.params)?;

        let event = ChainEvent::BlockMined {
            index,
            hash: block.hash.clone(),
            transactions: block.data.len(),
        };
        self.blocks.push(block);
        Ok(event)
    }

    /// Adopts `candidate` if it is strictly longer and valid.
    ///
    /// Rejections leave the local chain untouched.
    pub fn replace_chain(
        &mut self,
        candidate: Vec<Block>,
        validate_transactions: bool,
    ) -> Result<ChainEvent, ChainError> {
        let local = self.blocks.len();
        if candidate.len() <= local {
            let err = ChainError::ChainTooShort {
                incoming: candidate.len(),
                local,
            };
            tracing::warn!("{}", err);
            return Err(err);
        }

        if let Err(reason) = check_chain(&candidate, &self.params) {
            tracing::warn!("The incoming chain must be valid: {}", reason);
            return Err(ChainError::InvalidChain(Box::new(reason)));
        }

        if validate_transactions {
            if let Err(reason) = self.check_transaction_data(&candidate) {
                tracing::warn!("The incoming chain has invalid transaction data: {}", reason);
                return Err(ChainError::InvalidTransactionData(Box::new(reason)));
            }
        }

        let tip_hash = candidate
            .last()
            .map(|block| block.hash.clone())
            .unwrap_or_default();
        tracing::info!(
            old_length = local,
            new_length = candidate.len(),
            tip = %tip_hash,
            "Replacing chain"
        );
        self.blocks = candidate;

        Ok(ChainEvent::Replaced {
            old_length: local,
            new_length: self.blocks.len(),
            tip_hash,
        })
    }

    pub fn balance_of(&self, address: &str) -> u64 {
        calculate_balance(&self.blocks, address, self.params.starting_balance)
    }

    /// Every address that has sent or received value on this chain.
    pub fn known_addresses(&self) -> BTreeSet<String> {
        let mut addresses = BTreeSet::new();
        for tx in self.blocks.iter().flat_map(|block| block.data.iter()) {
            if let Some(transfer) = tx.as_transfer() {
                addresses.insert(transfer.input.address.clone());
            }
            addresses.extend(tx.output_addresses().into_iter().map(str::to_string));
        }
        addresses
    }

    /// Whole-chain snapshot in the wire form exchanged between nodes.
    pub fn to_json(&self) -> Result<String, ChainError> {
        Ok(serde_json::to_string(&self.blocks)?)
    }

    pub fn blocks_from_json(json: &str) -> Result<Vec<Block>, ChainError> {
        Ok(serde_json::from_str(json)?)
    }
}
