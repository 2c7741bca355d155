/// Transaction types for powledger
use crate::config::REWARD_INPUT_ADDRESS;
use crate::crypto::{Address, KeyPair, SigningContext};
use crate::error::ChainError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Address-keyed allocation of a transaction's input amount.
/// A `BTreeMap` so the signed encoding does not depend on insertion order.
pub type OutputMap = BTreeMap<Address, u64>;

/// A transaction that can occur in a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transaction {
    Transfer(TransferTx),
    Reward(RewardTx),
}

impl Transaction {
    /// Constructs the reward transaction paying `amount` to `miner`.
    pub fn reward(miner: &str, amount: u64) -> Self {
        Transaction::Reward(RewardTx {
            id: new_transaction_id(),
            input: RewardInput {
                timestamp: now_millis(),
                address: REWARD_INPUT_ADDRESS.to_string(),
            },
            output: RewardOutput {
                recipient: miner.to_string(),
                amount,
            },
        })
    }

    pub fn id(&self) -> &str {
        match self {
            Transaction::Transfer(tx) => &tx.id,
            Transaction::Reward(tx) => &tx.id,
        }
    }

    /// The sending address; the reward sentinel for reward transactions.
    pub fn input_address(&self) -> &str {
        match self {
            Transaction::Transfer(tx) => &tx.input.address,
            Transaction::Reward(tx) => &tx.input.address,
        }
    }

    pub fn is_reward(&self) -> bool {
        matches!(self, Transaction::Reward(_))
    }

    /// Amount this transaction allocates to `address`, if any.
    pub fn amount_for(&self, address: &str) -> Option<u64> {
        match self {
            Transaction::Transfer(tx) => tx.output_map.get(address).copied(),
            Transaction::Reward(tx) => {
                (tx.output.recipient == address).then_some(tx.output.amount)
            }
        }
    }

    pub fn output_addresses(&self) -> Vec<&str> {
        match self {
            Transaction::Transfer(tx) => tx.output_map.keys().map(String::as_str).collect(),
            Transaction::Reward(tx) => vec![tx.output.recipient.as_str()],
        }
    }

    pub fn as_transfer(&self) -> Option<&TransferTx> {
        match self {
            Transaction::Transfer(tx) => Some(tx),
            Transaction::Reward(_) => None,
        }
    }
}

impl From<TransferTx> for Transaction {
    fn from(tx: TransferTx) -> Self {
        Transaction::Transfer(tx)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInput {
    pub timestamp: u64,
    /// Sender balance at signing time.
    pub amount: u64,
    pub address: Address,
    /// Hex compact signature over the output map.
    pub signature: String,
}

/// Signed transfer from one sender to one or more recipients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTx {
    pub id: String,
    pub output_map: OutputMap,
    pub input: TransactionInput,
}

impl TransferTx {
    /// Builds and signs a transfer of `amount` out of `current_balance`.
    pub fn create(
        ctx: &SigningContext,
        sender: &KeyPair,
        recipient: &str,
        amount: u64,
        current_balance: u64,
    ) -> Result<Self, ChainError> {
        if amount > current_balance {
            return Err(ChainError::InsufficientFunds {
                requested: amount,
                available: current_balance,
            });
        }

        let sender_address = sender.address();
        if recipient == sender_address {
            return Err(ChainError::InvalidTransaction(
                "Recipient must differ from the sender".to_string(),
            ));
        }

        let mut output_map = OutputMap::new();
        output_map.insert(recipient.to_string(), amount);
        output_map.insert(sender_address, current_balance - amount);

        let input = Self::signed_input(ctx, sender, current_balance, &output_map)?;
        Ok(TransferTx {
            id: new_transaction_id(),
            output_map,
            input,
        })
    }

    /// Adds `amount` for `recipient` out of the sender's remaining change in
    /// this transaction, then re-signs the whole output map.
    pub fn update(
        &mut self,
        ctx: &SigningContext,
        sender: &KeyPair,
        recipient: &str,
        amount: u64,
    ) -> Result<(), ChainError> {
        let sender_address = sender.address();
        let remaining = self.output_map.get(&sender_address).copied().unwrap_or(0);
        if amount > remaining {
            return Err(ChainError::InsufficientFunds {
                requested: amount,
                available: remaining,
            });
        }

        *self.output_map.entry(recipient.to_string()).or_insert(0) += amount;
        *self.output_map.entry(sender_address).or_insert(0) -= amount;

        self.input = Self::signed_input(ctx, sender, self.input.amount, &self.output_map)?;
        Ok(())
    }

    /// The bytes covered by the input signature.
    pub fn signable_message(output_map: &OutputMap) -> Result<Vec<u8>, ChainError> {
        Ok(serde_json::to_vec(output_map)?)
    }

    pub fn output_total(&self) -> Option<u64> {
        self.output_map
            .values()
            .try_fold(0u64, |total, amount| total.checked_add(*amount))
    }

    fn signed_input(
        ctx: &SigningContext,
        sender: &KeyPair,
        amount: u64,
        output_map: &OutputMap,
    ) -> Result<TransactionInput, ChainError> {
        let message = Self::signable_message(output_map)?;
        Ok(TransactionInput {
            timestamp: now_millis(),
            amount,
            address: sender.address(),
            signature: sender.sign(ctx, &message),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardInput {
    pub timestamp: u64,
    pub address: Address,
}

/// The single output of a reward transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardOutput {
    pub recipient: Address,
    pub amount: u64,
}

/// Reward transaction: miner payout, identified by the sentinel input address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardTx {
    pub id: String,
    pub input: RewardInput,
    pub output: RewardOutput,
}

fn new_transaction_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}
