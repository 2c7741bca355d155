//! Integration tests for wallet creation and transaction handling

use powledger::blockchain::Blockchain;
use powledger::config::{ConsensusParams, MINING_REWARD, STARTING_BALANCE};
use powledger::crypto::{KeyPair, SigningContext};
use powledger::transaction::{Transaction, TransferTx};
use powledger::wallet::Wallet;
use std::sync::Arc;

/// Helper to create a test wallet
fn create_test_wallet(ctx: &Arc<SigningContext>) -> Wallet {
    Wallet::new(ctx.clone())
}

fn new_chain(ctx: &Arc<SigningContext>) -> Blockchain {
    Blockchain::new(ctx.clone(), ConsensusParams::default())
}

#[test]
fn test_wallet_creation() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Arc::new(SigningContext::new());
    let wallet = create_test_wallet(&ctx);

    // Compressed secp256k1 public key, hex encoded
    assert_eq!(wallet.address().len(), 66);
    assert!(wallet.address().chars().all(|c| c.is_ascii_hexdigit()));
    assert!(wallet.address().starts_with("02") || wallet.address().starts_with("03"));

    Ok(())
}

#[test]
fn test_create_two_wallets() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Arc::new(SigningContext::new());
    let alice = create_test_wallet(&ctx);
    let bob = create_test_wallet(&ctx);

    assert_ne!(alice.address(), bob.address());
    assert_ne!(
        alice.keypair().secret_key.secret_bytes(),
        bob.keypair().secret_key.secret_bytes()
    );

    Ok(())
}

#[test]
fn test_wallet_keypair_derivation() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Arc::new(SigningContext::new());
    let wallet = create_test_wallet(&ctx);

    let secret = wallet.keypair().secret_key.secret_bytes();
    let restored = KeyPair::from_secret_bytes(&ctx, &secret)?;
    assert_eq!(restored.address(), wallet.address());

    Ok(())
}

#[test]
fn test_blockchain_initialization() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Arc::new(SigningContext::new());
    let blockchain = new_chain(&ctx);

    assert_eq!(blockchain.len(), 1);
    assert_eq!(blockchain.tip().hash, "genesis-hash");
    assert_eq!(blockchain.tip().difficulty, 3);

    Ok(())
}

#[test]
fn test_alice_to_bob_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Arc::new(SigningContext::new());
    let mut chain = new_chain(&ctx);
    let alice = create_test_wallet(&ctx);
    let bob = create_test_wallet(&ctx);
    let miner = create_test_wallet(&ctx);

    let tx = alice.create_transaction(&bob.address(), 50, chain.blocks(), chain.params())?;
    assert!(tx.is_valid(&ctx));

    chain.add_block(vec![
        tx.into(),
        Transaction::reward(&miner.address(), MINING_REWARD),
    ])?;

    assert_eq!(alice.balance(chain.blocks(), chain.params()), STARTING_BALANCE - 50);
    assert_eq!(bob.balance(chain.blocks(), chain.params()), STARTING_BALANCE + 50);
    assert_eq!(
        miner.balance(chain.blocks(), chain.params()),
        STARTING_BALANCE + MINING_REWARD
    );

    Ok(())
}

#[test]
fn test_received_then_spent_balance() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Arc::new(SigningContext::new());
    let mut chain = new_chain(&ctx);
    let wallet = create_test_wallet(&ctx);
    let payer_one = create_test_wallet(&ctx);
    let payer_two = create_test_wallet(&ctx);

    let fifty = payer_one.create_transaction(&wallet.address(), 50, chain.blocks(), chain.params())?;
    let thirty = payer_two.create_transaction(&wallet.address(), 30, chain.blocks(), chain.params())?;
    chain.add_block(vec![fifty.into(), thirty.into()])?;
    assert_eq!(wallet.balance(chain.blocks(), chain.params()), STARTING_BALANCE + 80);

    let spend = wallet.create_transaction("elsewhere", 20, chain.blocks(), chain.params())?;
    assert_eq!(spend.input.amount, STARTING_BALANCE + 80);
    chain.add_block(vec![spend.into()])?;
    assert_eq!(wallet.balance(chain.blocks(), chain.params()), STARTING_BALANCE + 60);

    Ok(())
}

#[test]
fn test_multi_recipient_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Arc::new(SigningContext::new());
    let mut chain = new_chain(&ctx);
    let alice = create_test_wallet(&ctx);

    let mut tx = alice.create_transaction("bob", 100, chain.blocks(), chain.params())?;
    alice.update_transaction(&mut tx, "carol", 200)?;
    alice.update_transaction(&mut tx, "bob", 50)?;
    assert!(tx.is_valid(&ctx));

    chain.add_block(vec![tx.into()])?;
    assert_eq!(chain.balance_of("bob"), STARTING_BALANCE + 150);
    assert_eq!(chain.balance_of("carol"), STARTING_BALANCE + 200);
    assert_eq!(chain.balance_of(&alice.address()), STARTING_BALANCE - 350);

    Ok(())
}

#[test]
fn test_forged_transaction_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Arc::new(SigningContext::new());
    let victim = KeyPair::generate(&ctx);
    let thief = KeyPair::generate(&ctx);

    // Output map spending the victim's funds, signed by the thief
    let mut forged = TransferTx::create(&ctx, &thief, "thief", 500, 1000)?;
    forged.output_map.clear();
    forged.output_map.insert("thief".to_string(), 500);
    forged.output_map.insert(victim.address(), 500);
    forged.input.address = victim.address();
    let message = TransferTx::signable_message(&forged.output_map)?;
    forged.input.signature = thief.sign(&ctx, &message);

    assert!(!forged.is_valid(&ctx));

    Ok(())
}
