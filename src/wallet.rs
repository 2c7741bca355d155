//! Wallet identity and balance replay

use crate::blockchain::Block;
use crate::config::ConsensusParams;
use crate::crypto::{Address, KeyPair, SigningContext};
use crate::error::ChainError;
use crate::transaction::TransferTx;
use std::sync::Arc;

/// Balance of `address` as of the end of `chain`.
///
/// Walks blocks newest to oldest, skipping genesis, adding every output paid
/// to `address`. The first block in which `address` sent a transaction ends the
/// walk: its change output already carries everything earlier. An address that
/// never sent starts from `starting_balance`.
pub fn calculate_balance(chain: &[Block], address: &str, starting_balance: u64) -> u64 {
    let mut outputs_total: u64 = 0;

    for block in chain.iter().skip(1).rev() {
        let mut has_sent = false;
        for tx in &block.data {
            if tx.input_address() == address {
                has_sent = true;
            }
            if let Some(amount) = tx.amount_for(address) {
                outputs_total = outputs_total.saturating_add(amount);
            }
        }
        if has_sent {
            return outputs_total;
        }
    }

    starting_balance.saturating_add(outputs_total)
}

#[derive(Debug, Clone)]
pub struct Wallet {
    ctx: Arc<SigningContext>,
    keypair: KeyPair,
    pub public_key: Address,
}

impl Wallet {
    /// Generates a fresh keypair.
    pub fn new(ctx: Arc<SigningContext>) -> Self {
        let keypair = KeyPair::generate(&ctx);
        Self::from_keypair(ctx, keypair)
    }

    pub fn from_keypair(ctx: Arc<SigningContext>, keypair: KeyPair) -> Self {
        let public_key = keypair.address();
        Wallet {
            ctx,
            keypair,
            public_key,
        }
    }

    pub fn address(&self) -> Address {
        self.public_key.clone()
    }

    pub fn signing_context(&self) -> &Arc<SigningContext> {
        &self.ctx
    }

    pub fn keypair(&self) -> &KeyPair {
        &self.keypair
    }

    pub fn sign(&self, message: &[u8]) -> String {
        self.keypair.sign(&self.ctx, message)
    }

    /// Recomputed from `chain` on every call.
    pub fn balance(&self, chain: &[Block], params: &ConsensusParams) -> u64 {
        calculate_balance(chain, &self.public_key, params.starting_balance)
    }

    /// A signed transfer spending from the balance this wallet holds on `chain`.
    pub fn create_transaction(
        &self,
        recipient: &str,
        amount: u64,
        chain: &[Block],
        params: &ConsensusParams,
    ) -> Result<TransferTx, ChainError> {
        let balance = self.balance(chain, params);
        TransferTx::create(&self.ctx, &self.keypair, recipient, amount, balance)
    }

    /// Adds another recipient to a pending transaction of this wallet.
    pub fn update_transaction(
        &self,
        tx: &mut TransferTx,
        recipient: &str,
        amount: u64,
    ) -> Result<(), ChainError> {
        tx.update(&self.ctx, &self.keypair, recipient, amount)
    }
}
