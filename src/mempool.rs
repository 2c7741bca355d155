//! Pending transaction pool

use crate::blockchain::Block;
use crate::crypto::SigningContext;
use crate::transaction::{Transaction, TransferTx};
use std::collections::{HashMap, HashSet};

/// Transactions waiting to be mined, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct Mempool {
    transactions: HashMap<String, Transaction>,
    /// Ids in first-insertion order.
    order: Vec<String>,
}

impl Mempool {
    pub fn new() -> Self {
        Mempool {
            transactions: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Inserts `tx`, replacing any pooled transaction with the same id.
    /// A replacement keeps its original position.
    pub fn set_transaction(&mut self, tx: Transaction) {
        let id = tx.id().to_string();
        if self.transactions.insert(id.clone(), tx).is_none() {
            self.order.push(id);
        }
    }

    /// First pooled transaction sent by `input_address`.
    pub fn existing_transaction(&self, input_address: &str) -> Option<&Transaction> {
        self.iter().find(|tx| tx.input_address() == input_address)
    }

    /// Pending transfer of `input_address`, for in-place update.
    pub fn existing_transfer_mut(&mut self, input_address: &str) -> Option<&mut TransferTx> {
        let id = self
            .existing_transaction(input_address)
            .map(|tx| tx.id().to_string())?;
        match self.transactions.get_mut(&id) {
            Some(Transaction::Transfer(tx)) => Some(tx),
            _ => None,
        }
    }

    /// Transfers that pass validation, in insertion order. Rewards are never
    /// returned.
    pub fn valid_transactions(&self, ctx: &SigningContext) -> Vec<Transaction> {
        self.iter()
            .filter(|tx| match tx.as_transfer() {
                Some(transfer) => transfer.is_valid(ctx),
                None => false,
            })
            .cloned()
            .collect()
    }

    /// Drops every pooled transaction whose id appears in `chain`; returns how
    /// many were removed.
    pub fn clear_blockchain_transactions(&mut self, chain: &[Block]) -> usize {
        let committed: HashSet<&str> = chain
            .iter()
            .flat_map(|block| block.data.iter())
            .map(Transaction::id)
            .collect();

        let before = self.transactions.len();
        self.transactions.retain(|id, _| !committed.contains(id.as_str()));
        self.order.retain(|id| !committed.contains(id.as_str()));
        before - self.transactions.len()
    }

    pub fn remove_transaction(&mut self, id: &str) -> Option<Transaction> {
        let removed = self.transactions.remove(id)?;
        self.order.retain(|pooled| pooled != id);
        Some(removed)
    }

    pub fn get(&self, id: &str) -> Option<&Transaction> {
        self.transactions.get(id)
    }

    /// Snapshot in insertion order.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.transactions.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.order.iter().filter_map(|id| self.transactions.get(id))
    }
}
