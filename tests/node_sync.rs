//! Integration tests for several nodes trading and syncing chains

use powledger::blockchain::ChainEvent;
use powledger::config::Config;
use powledger::crypto::SigningContext;
use powledger::error::ChainError;
use powledger::node::Node;
use std::sync::Arc;
use std::thread;

fn network(size: usize) -> Vec<Node> {
    let ctx = Arc::new(SigningContext::new());
    (0..size)
        .map(|_| Node::new(Config::default(), ctx.clone()))
        .collect()
}

fn broadcast_chain(nodes: &[Node], from: usize) -> Result<(), ChainError> {
    let snapshot = nodes[from].chain_snapshot_json()?;
    for (i, node) in nodes.iter().enumerate() {
        if i != from {
            node.propose_chain_json(&snapshot)?;
        }
    }
    Ok(())
}

#[test]
fn test_transactions_propagate_and_settle() -> Result<(), Box<dyn std::error::Error>> {
    let nodes = network(3);
    let bob = nodes[1].address();

    let tx = nodes[0].transact(&bob, 120)?;
    nodes[2].submit_transaction(tx);

    nodes[2].mine_pending()?;
    broadcast_chain(&nodes, 2)?;

    for node in &nodes {
        assert_eq!(node.chain(), nodes[2].chain());
        assert!(node.pending_transactions().is_empty());
        assert_eq!(node.balance(&nodes[0].address()), 880);
        assert_eq!(node.balance(&bob), 1120);
        assert_eq!(node.balance(&nodes[2].address()), 1050);
    }

    Ok(())
}

#[test]
fn test_rounds_of_trading_keep_nodes_in_sync() -> Result<(), Box<dyn std::error::Error>> {
    let nodes = network(3);
    let addresses: Vec<String> = nodes.iter().map(Node::address).collect();

    for round in 0..3 {
        for (i, node) in nodes.iter().enumerate() {
            let recipient = &addresses[(i + 1) % nodes.len()];
            let tx = node.transact(recipient, 10 + round as u64)?;
            for (j, peer) in nodes.iter().enumerate() {
                if j != i {
                    peer.submit_transaction(tx.clone());
                }
            }
        }

        let miner = round % nodes.len();
        nodes[miner].mine_pending()?;
        broadcast_chain(&nodes, miner)?;
    }

    // each node paid and received 10 + 11 + 12, and mined once
    for node in &nodes {
        assert_eq!(node.chain().len(), 4);
        for address in &addresses {
            assert_eq!(node.balance(address), 1050);
        }
    }

    Ok(())
}

#[test]
fn test_peer_rejects_chain_with_stale_input() -> Result<(), Box<dyn std::error::Error>> {
    let nodes = network(2);
    let spender = nodes[0].address();

    // settle one payment everywhere
    nodes[0].transact("shop", 100)?;
    nodes[0].mine_pending()?;
    broadcast_chain(&nodes, 0)?;

    // node 1 builds a block replaying a transaction against the old balance
    let stale = nodes[0]
        .wallet()
        .create_transaction("shop", 5, &nodes[0].chain()[..1], &Config::default().consensus)?;
    nodes[1].mine_block(vec![stale.into()])?;

    let result = nodes[0].propose_chain(nodes[1].chain());
    assert!(matches!(result, Err(ChainError::InvalidTransactionData(_))));
    assert_eq!(nodes[0].balance(&spender), 950);

    Ok(())
}

#[test]
fn test_proposal_events_reach_subscribers() -> Result<(), Box<dyn std::error::Error>> {
    let nodes = network(2);
    let events = nodes[1].subscribe();

    nodes[0].mine_pending()?;
    nodes[0].mine_pending()?;
    broadcast_chain(&nodes, 0)?;

    match events.try_recv()? {
        ChainEvent::Replaced {
            old_length,
            new_length,
            tip_hash,
        } => {
            assert_eq!(old_length, 1);
            assert_eq!(new_length, 3);
            assert_eq!(tip_hash, nodes[0].chain()[2].hash);
        }
        other => panic!("unexpected event {:?}", other),
    }

    Ok(())
}

#[test]
fn test_concurrent_proposals_leave_one_consistent_chain() -> Result<(), Box<dyn std::error::Error>> {
    let miners = network(3);
    for (i, miner) in miners.iter().enumerate() {
        for _ in 0..=i {
            miner.mine_pending()?;
        }
    }
    let target = Arc::new(Node::new(Config::default(), Arc::new(SigningContext::new())));

    let handles: Vec<_> = miners
        .iter()
        .map(|miner| {
            let target = Arc::clone(&target);
            let chain = miner.chain();
            thread::spawn(move || target.propose_chain(chain).is_ok())
        })
        .collect();
    let accepted: Vec<bool> = handles
        .into_iter()
        .map(|handle| handle.join().expect("proposer thread panicked"))
        .collect();

    // nothing is longer than the third miner's chain, so it is always adopted
    assert!(accepted[2]);

    assert_eq!(target.chain(), miners[2].chain());

    Ok(())
}

#[test]
fn test_wallet_pays_again_after_adopting_chain_that_credits_it() -> Result<(), Box<dyn std::error::Error>> {
    let nodes = network(2);
    let (a, b) = (&nodes[0], &nodes[1]);

    // A's payment stays local while B pays A and mines
    a.transact("shop", 100)?;
    b.transact(&a.address(), 5)?;
    b.mine_pending()?;
    broadcast_chain(&nodes, 1)?;
    assert_eq!(a.wallet_balance(), 1005);

    let tx = a.transact("shop", 13)?;
    assert_eq!(tx.as_transfer().map(|t| t.input.amount), Some(1005));
    assert_eq!(a.pending_transactions().len(), 1);
    a.mine_pending()?;
    assert_eq!(a.balance("shop"), 1013);
    assert_eq!(a.wallet_balance(), 1005 - 13 + 50);

    a.transact("shop", 7)?;
    a.mine_pending()?;
    assert_eq!(a.balance("shop"), 1020);
    assert_eq!(a.wallet_balance(), 1042 - 7 + 50);
    assert!(a.pending_transactions().is_empty());

    Ok(())
}
