//! Proof-of-work mining and difficulty adjustment

use crate::blockchain::{Block, Blockchain, ChainEvent};
use crate::config::ConsensusParams;
use crate::crypto::{hex_leading_zero_bits, SigningContext};
use crate::error::ChainError;
use crate::mempool::Mempool;
use crate::transaction::Transaction;
use crate::wallet::{calculate_balance, Wallet};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Difficulty for a block stamped `timestamp` that follows `last_block`.
///
/// Slower than the mine rate lowers difficulty by one, otherwise it rises by
/// one. Never drops below 1.
pub fn adjust_difficulty(last_block: &Block, timestamp: u64, mine_rate_ms: u64) -> i32 {
    let difficulty = last_block.difficulty;
    if difficulty < 1 {
        return 1;
    }

    if timestamp.saturating_sub(last_block.timestamp) > mine_rate_ms {
        difficulty - 1
    } else {
        difficulty + 1
    }
}

/// Whether `hash` has at least `difficulty` leading zero bits.
pub fn is_hash_valid(hash: &str, difficulty: i32) -> bool {
    match u32::try_from(difficulty) {
        Ok(required) => hex_leading_zero_bits(hash) >= required,
        Err(_) => true,
    }
}

/// Searches for a nonce sealing `data` on top of `last_block`.
///
/// Timestamp and difficulty are recomputed on every attempt. Returns
/// [`ChainError::MiningCancelled`] as soon as `cancel` is observed set.
pub fn mine_block(
    last_block: &Block,
    data: Vec<Transaction>,
    params: &ConsensusParams,
    cancel: &AtomicBool,
) -> Result<Block, ChainError> {
    let start = Instant::now();
    let last_hash = last_block.hash.clone();
    let mut nonce: u64 = 0;

    loop {
        if cancel.load(Ordering::Relaxed) {
            tracing::debug!(nonce, "Mining cancelled");
            return Err(ChainError::MiningCancelled);
        }

        nonce = nonce.wrapping_add(1);
        let timestamp = now_millis();
        let difficulty = adjust_difficulty(last_block, timestamp, params.mine_rate_ms);
        let hash = Block::compute_hash(timestamp, &last_hash, &data, nonce, difficulty)?;

        if is_hash_valid(&hash, difficulty) {
            tracing::debug!(
                nonce,
                difficulty,
                elapsed_ms = start.elapsed().as_millis() as u64,
                hash = %hash,
                "Block mined"
            );
            return Ok(Block {
                timestamp,
                last_hash,
                hash,
                data,
                nonce,
                difficulty,
            });
        }
    }
}

/// Transactions for the next block: pooled transfers whose input amount still
/// matches the sender's balance on `chain`, at most one per sender, followed by
/// the reward for `miner_address`.
pub fn block_template(
    mempool: &Mempool,
    chain: &[Block],
    ctx: &SigningContext,
    miner_address: &str,
    params: &ConsensusParams,
) -> Vec<Transaction> {
    let mut senders = HashSet::new();
    let mut data: Vec<Transaction> = mempool
        .valid_transactions(ctx)
        .into_iter()
        .filter(|tx| match tx.as_transfer() {
            Some(transfer) => {
                let address = transfer.input.address.as_str();
                let balance = calculate_balance(chain, address, params.starting_balance);
                if transfer.input.amount != balance {
                    tracing::debug!(tx = %transfer.id, "Skipping transaction with stale input");
                    return false;
                }
                senders.insert(address.to_string())
            }
            None => false,
        })
        .collect();

    data.push(Transaction::reward(miner_address, params.mining_reward));
    data
}

/// Mines the pool into the chain for one wallet, single-threaded.
pub struct TransactionMiner<'a> {
    blockchain: &'a mut Blockchain,
    mempool: &'a mut Mempool,
    wallet: &'a Wallet,
}

impl<'a> TransactionMiner<'a> {
    pub fn new(blockchain: &'a mut Blockchain, mempool: &'a mut Mempool, wallet: &'a Wallet) -> Self {
        Self {
            blockchain,
            mempool,
            wallet,
        }
    }

    /// Valid pooled transactions plus a reward, mined onto the tip; the
    /// committed transactions are then dropped from the pool.
    pub fn mine_transactions(&mut self) -> Result<ChainEvent, ChainError> {
        let data = block_template(
            self.mempool,
            self.blockchain.blocks(),
            self.blockchain.signing_context(),
            &self.wallet.address(),
            self.blockchain.params(),
        );
        let transactions = data.len();

        let hash = self.blockchain.add_block(data)?.hash.clone();
        let event = ChainEvent::BlockMined {
            index: self.blockchain.len() - 1,
            hash,
            transactions,
        };

        let cleared = self.mempool.clear_blockchain_transactions(self.blockchain.blocks());
        tracing::info!(cleared, "Mined pending transactions");
        Ok(event)
    }
}

fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}
