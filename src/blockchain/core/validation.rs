use crate::config::ConsensusParams;
use crate::error::ChainError;
use crate::transaction::Transaction;
use crate::wallet::calculate_balance;
use std::collections::{BTreeMap, HashSet};

use super::chain::{Block, Blockchain};

/// Checks that `block` may follow `prev` at position `index`.
pub(crate) fn check_block_link(
    prev: &Block,
    block: &Block,
    index: usize,
    params: &ConsensusParams,
) -> Result<(), ChainError> {
    if block.last_hash != prev.hash {
        return Err(ChainError::BrokenHashLink(index));
    }

    if (i64::from(block.difficulty) - i64::from(prev.difficulty)).abs() > 1 {
        return Err(ChainError::DifficultyJump {
            index,
            from: prev.difficulty,
            to: block.difficulty,
        });
    }

    match block.recompute_hash() {
        Ok(hash) if hash == block.hash => {}
        _ => return Err(ChainError::HashMismatch(index)),
    }

    if params.enforce_pow_target && !block.meets_target() {
        return Err(ChainError::InsufficientWork(index));
    }

    Ok(())
}

/// Structural validation of a whole chain; reports the first violation.
pub fn check_chain(chain: &[Block], params: &ConsensusParams) -> Result<(), ChainError> {
    match chain.first() {
        Some(first) if *first == Block::genesis() => {}
        _ => return Err(ChainError::InvalidGenesis),
    }

    for (index, pair) in chain.windows(2).enumerate() {
        check_block_link(&pair[0], &pair[1], index + 1, params)?;
    }
    Ok(())
}

/// Predicate form of [`check_chain`].
pub fn is_valid_chain(chain: &[Block], params: &ConsensusParams) -> bool {
    check_chain(chain, params).is_ok()
}

impl Blockchain {
    /// Re-derives ledger correctness of `candidate`, using this (local) chain
    /// as the balance authority.
    ///
    /// Only the most recent transaction of each sender is checked against the
    /// local balance, computed over the local blocks preceding the block that
    /// carries it.
    pub fn check_transaction_data(&self, candidate: &[Block]) -> Result<(), ChainError> {
        let ctx = self.signing_context();
        let params = self.params();
        let mut latest_by_sender: BTreeMap<&str, (usize, u64)> = BTreeMap::new();

        for (index, block) in candidate.iter().enumerate().skip(1) {
            let mut seen_ids = HashSet::new();
            let mut reward_count = 0;

            for tx in &block.data {
                match tx {
                    Transaction::Reward(reward) => {
                        reward_count += 1;
                        if reward_count > 1 {
                            return Err(ChainError::DuplicateReward(index));
                        }
                        reward.validate(params.mining_reward)?;
                    }
                    Transaction::Transfer(transfer) => {
                        transfer.validate(ctx)?;
                        if !seen_ids.insert(transfer.id.as_str()) {
                            return Err(ChainError::DuplicateTransaction(transfer.id.clone()));
                        }
                        latest_by_sender
                            .insert(transfer.input.address.as_str(), (index, transfer.input.amount));
                    }
                }
            }
        }

        for (address, (index, claimed)) in latest_by_sender {
            let history = &self.blocks()[..index.min(self.len())];
            let actual = calculate_balance(history, address, params.starting_balance);
            if claimed != actual {
                return Err(ChainError::StaleBalance {
                    address: address.to_string(),
                    claimed,
                    actual,
                });
            }
        }

        Ok(())
    }

    /// Predicate form of [`Blockchain::check_transaction_data`].
    pub fn valid_transaction_data(&self, candidate: &[Block]) -> bool {
        match self.check_transaction_data(candidate) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Invalid transaction data: {}", e);
                false
            }
        }
    }
}
