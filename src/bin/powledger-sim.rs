#![forbid(unsafe_code)]
use clap::Parser;
use powledger::blockchain::ChainEvent;
use powledger::config::load_config;
use powledger::crypto::SigningContext;
use powledger::node::Node;
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};

/// Runs several in-process nodes that pay each other, mine in turn and
/// propose their chains to one another.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of nodes
    #[arg(short, long, default_value_t = 3)]
    nodes: usize,
    /// Mining rounds to run
    #[arg(short, long, default_value_t = 5)]
    rounds: usize,
    /// Largest single payment
    #[arg(long, default_value_t = 25)]
    max_payment: u64,
    /// TOML configuration file
    #[arg(short, long, default_value = "powledger.toml")]
    config: PathBuf,
    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    if cli.nodes < 2 {
        return Err("at least two nodes are needed".into());
    }

    let config = load_config(&cli.config)?;
    let ctx = Arc::new(SigningContext::new());
    let nodes: Vec<Node> = (0..cli.nodes)
        .map(|_| Node::new(config.clone(), ctx.clone()))
        .collect();
    let addresses: Vec<String> = nodes.iter().map(Node::address).collect();
    let mut rng = rand::thread_rng();

    for round in 0..cli.rounds {
        for (i, node) in nodes.iter().enumerate() {
            let recipient = match addresses
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, address)| address)
                .collect::<Vec<_>>()
                .choose(&mut rng)
            {
                Some(address) => (*address).clone(),
                None => continue,
            };
            let amount = rng.gen_range(1..=cli.max_payment.max(1));

            match node.transact(&recipient, amount) {
                Ok(tx) => {
                    for (j, peer) in nodes.iter().enumerate() {
                        if j != i {
                            peer.submit_transaction(tx.clone());
                        }
                    }
                }
                Err(e) => warn!("Node {} could not pay {}: {}", i, amount, e),
            }
        }

        let miner_index = round % nodes.len();
        let miner = &nodes[miner_index];
        match miner.mine_pending()? {
            ChainEvent::BlockMined {
                index,
                hash,
                transactions,
            } => info!(
                "Round {}: node {} mined block {} ({} transactions) {}",
                round, miner_index, index, transactions, hash
            ),
            other => info!("Round {}: {:?}", round, other),
        }

        let snapshot = miner.chain_snapshot_json()?;
        for (j, peer) in nodes.iter().enumerate() {
            if j == miner_index {
                continue;
            }
            if let Err(e) = peer.propose_chain_json(&snapshot) {
                warn!("Node {} rejected chain from node {}: {}", j, miner_index, e);
            }
        }
    }

    println!();
    println!("{:<6} {:<16} {:>10}", "node", "address", "balance");
    for (i, node) in nodes.iter().enumerate() {
        let address = node.address();
        println!(
            "{:<6} {:<16} {:>10}",
            i,
            address.get(..16).unwrap_or(&address),
            nodes[0].balance(&address)
        );
    }
    println!(
        "chain length {} on every node: {}",
        nodes[0].chain().len(),
        nodes.iter().all(|node| node.chain() == nodes[0].chain())
    );

    Ok(())
}
