/// Validation logic for transactions separated from type definitions
use crate::config::REWARD_INPUT_ADDRESS;
use crate::crypto::{verify_signature, SigningContext};
use crate::error::ChainError;
use crate::transaction::types::{RewardTx, Transaction, TransferTx};

impl Transaction {
    /// Stateless validation. Rewards are checked against the expected payout.
    pub fn validate(&self, ctx: &SigningContext, mining_reward: u64) -> Result<(), ChainError> {
        match self {
            Transaction::Transfer(tx) => tx.validate(ctx),
            Transaction::Reward(tx) => tx.validate(mining_reward),
        }
    }
}

impl TransferTx {
    /// Checks that the outputs sum to the input amount and that the input
    /// signature covers the current output map.
    pub fn validate(&self, ctx: &SigningContext) -> Result<(), ChainError> {
        let address = &self.input.address;

        match self.output_total() {
            Some(total) if total == self.input.amount => {}
            total => {
                return Err(ChainError::InvalidOutputSum {
                    address: address.clone(),
                    outputs: total.unwrap_or(u64::MAX),
                    input: self.input.amount,
                })
            }
        }

        let message = Self::signable_message(&self.output_map)?;
        verify_signature(ctx, address, &message, &self.input.signature)
            .map_err(|_| ChainError::InvalidSignature(address.clone()))
    }

    /// Predicate form of [`TransferTx::validate`]; never errors.
    pub fn is_valid(&self, ctx: &SigningContext) -> bool {
        match self.validate(ctx) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(tx = %self.id, "Rejected transaction: {}", e);
                false
            }
        }
    }
}

impl RewardTx {
    pub fn validate(&self, mining_reward: u64) -> Result<(), ChainError> {
        if self.input.address != REWARD_INPUT_ADDRESS {
            return Err(ChainError::InvalidTransaction(format!(
                "Reward {} does not carry the reward input address",
                self.id
            )));
        }
        if self.output.amount != mining_reward {
            return Err(ChainError::BadRewardAmount {
                id: self.id.clone(),
                amount: self.output.amount,
                expected: mining_reward,
            });
        }
        Ok(())
    }
}
