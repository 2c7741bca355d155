use crate::blockchain::{Block, Blockchain, ChainEvent};
use crate::config::Config;
use crate::crypto::{Address, SigningContext};
use crate::error::ChainError;
use crate::mempool::Mempool;
use crate::miner::{block_template, mine_block};
use crate::transaction::Transaction;
use crate::wallet::Wallet;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One participant: a chain, a pool and a wallet behind the operations peers
/// and users invoke.
///
/// Locks are always taken chain first, then pool. Mining runs without holding
/// either.
pub struct Node {
    pub config: Config,
    pub blockchain: Arc<RwLock<Blockchain>>,
    pub mempool: Arc<Mutex<Mempool>>,
    wallet: Wallet,
    mining_cancel: AtomicBool,
    subscribers: Mutex<Vec<Sender<ChainEvent>>>,
}

impl Node {
    pub fn new(config: Config, ctx: Arc<SigningContext>) -> Self {
        let wallet = Wallet::new(ctx);
        Self::with_wallet(config, wallet)
    }

    pub fn with_wallet(config: Config, wallet: Wallet) -> Self {
        let blockchain = Blockchain::new(wallet.signing_context().clone(), config.consensus.clone());
        info!("Starting node {}", short(&wallet.public_key));

        Self {
            config,
            blockchain: Arc::new(RwLock::new(blockchain)),
            mempool: Arc::new(Mutex::new(Mempool::new())),
            wallet,
            mining_cancel: AtomicBool::new(false),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    /// A receiver for every chain mutation from now on.
    pub fn subscribe(&self) -> Receiver<ChainEvent> {
        let (tx, rx) = match self.config.node.event_capacity {
            0 => unbounded(),
            capacity => bounded(capacity),
        };
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn chain(&self) -> Vec<Block> {
        self.blockchain.read().blocks().to_vec()
    }

    /// The wire form a peer passes to [`Node::propose_chain`].
    pub fn chain_snapshot_json(&self) -> Result<String, ChainError> {
        self.blockchain.read().to_json()
    }

    pub fn balance(&self, address: &str) -> u64 {
        self.blockchain.read().balance_of(address)
    }

    pub fn wallet_balance(&self) -> u64 {
        self.balance(&self.wallet.public_key)
    }

    pub fn known_addresses(&self) -> BTreeSet<String> {
        self.blockchain.read().known_addresses()
    }

    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.mempool.lock().transactions()
    }

    /// Pools a transaction received from a peer or user. Validity is checked
    /// when a block is assembled.
    pub fn submit_transaction(&self, tx: Transaction) {
        debug!(tx = %tx.id(), "Pooling transaction");
        self.mempool.lock().set_transaction(tx);
    }

    /// Pays `recipient` from this node's wallet, folding the payment into the
    /// wallet's pending transaction when there is one.
    ///
    /// A pending transfer signed against a balance the chain no longer holds
    /// is dropped and replaced by a fresh one.
    pub fn transact(&self, recipient: &str, amount: u64) -> Result<Transaction, ChainError> {
        let chain = self.blockchain.read();
        let mut pool = self.mempool.lock();
        let address = self.wallet.address();
        let balance = self.wallet.balance(chain.blocks(), chain.params());

        let stale = match pool.existing_transfer_mut(&address) {
            Some(pending)
                if pending.input.amount == balance && pending.is_valid(chain.signing_context()) =>
            {
                self.wallet.update_transaction(pending, recipient, amount)?;
                return Ok(Transaction::Transfer(pending.clone()));
            }
            Some(pending) => Some(pending.id.clone()),
            None => None,
        };
        if let Some(id) = stale {
            warn!(tx = %id, "Replacing pending transaction signed against a stale balance");
            pool.remove_transaction(&id);
        }

        let tx: Transaction = self
            .wallet
            .create_transaction(recipient, amount, chain.blocks(), chain.params())?
            .into();
        pool.set_transaction(tx.clone());
        Ok(tx)
    }

    /// Adopts a peer's chain when it is longer and valid, then drops the
    /// transactions it commits from the pool.
    pub fn propose_chain(&self, candidate: Vec<Block>) -> Result<ChainEvent, ChainError> {
        let event = {
            let mut chain = self.blockchain.write();
            let event = chain.replace_chain(candidate, self.config.node.validate_transactions)?;
            self.mining_cancel.store(true, Ordering::SeqCst);

            let cleared = self.mempool.lock().clear_blockchain_transactions(chain.blocks());
            debug!(cleared, "Cleared committed transactions");
            event
        };

        self.emit(&event);
        Ok(event)
    }

    /// Like [`Node::propose_chain`], from the JSON wire form.
    pub fn propose_chain_json(&self, json: &str) -> Result<ChainEvent, ChainError> {
        self.propose_chain(Blockchain::blocks_from_json(json)?)
    }

    /// Mines `data` as given onto the current tip.
    ///
    /// The search runs without locks; if the tip moved meanwhile the block is
    /// discarded with [`ChainError::StaleTip`].
    pub fn mine_block(&self, data: Vec<Transaction>) -> Result<ChainEvent, ChainError> {
        self.mining_cancel.store(false, Ordering::SeqCst);
        let (tip, params) = {
            let chain = self.blockchain.read();
            (chain.tip().clone(), chain.params().clone())
        };

        let block = mine_block(&tip, data, &params, &self.mining_cancel)?;

        let event = {
            let mut chain = self.blockchain.write();
            let event = match chain.append_mined(block) {
                Ok(event) => event,
                Err(e) => {
                    warn!("Discarding mined block: {}", e);
                    return Err(e);
                }
            };
            self.mempool.lock().clear_blockchain_transactions(chain.blocks());
            event
        };

        info!(?event, "Block mined");
        self.emit(&event);
        Ok(event)
    }

    /// Mines the valid pooled transactions plus a reward for this wallet.
    pub fn mine_pending(&self) -> Result<ChainEvent, ChainError> {
        let data = {
            let chain = self.blockchain.read();
            let pool = self.mempool.lock();
            block_template(
                &pool,
                chain.blocks(),
                chain.signing_context(),
                &self.wallet.public_key,
                chain.params(),
            )
        };
        self.mine_block(data)
    }

    /// Stops an in-flight search; it returns [`ChainError::MiningCancelled`].
    pub fn cancel_mining(&self) {
        self.mining_cancel.store(true, Ordering::SeqCst);
    }

    fn emit(&self, event: &ChainEvent) {
        self.subscribers.lock().retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Event subscriber is full, dropping event");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}

fn short(address: &str) -> &str {
    address.get(..12).unwrap_or(address)
}
