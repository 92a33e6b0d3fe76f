//! emberchain-node — the emberchain full-node binary.
//!
//! Startup sequence:
//!   1. Open (or initialise) the persistent store and load the ledger
//!   2. Start the gossip network (peer connections, handshake, discovery)
//!   3. Run the operator command loop, interleaved with inbound gossip
//!      events, on a single task — chain-mutating operations never run
//!      concurrently with one another (see the concurrency design notes).
//!
//! There is no HTTP/RPC server here: the façade that would normally
//! drive these operations over a network is external to this crate.
//! Operators drive the node directly through line commands on stdin.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::{info, warn};

use emberchain_contracts::{Code, ContractManager};
use emberchain_core::constants::DEFAULT_GAS_LIMIT;
use emberchain_core::types::{ContractAddress, PublicKeyHex};
use emberchain_core::Transaction;
use emberchain_ledger::Ledger;
use emberchain_net::{GossipConfig, GossipEvent, GossipNetwork};
use emberchain_store::Store;

#[derive(Parser, Debug)]
#[command(
    name = "emberchain-node",
    version,
    about = "emberchain full node — ledger, gossip and contract VM in one process"
)]
struct Args {
    /// Directory for the persistent store. A purely in-memory node is
    /// used when omitted — useful for local experiments.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// This node's externally-reachable gossip URL, e.g. `tcp://127.0.0.1:8001`.
    #[arg(long, default_value = "tcp://127.0.0.1:8001")]
    node_url: String,

    /// Local address the gossip listener binds to.
    #[arg(long, default_value = "0.0.0.0:8001")]
    listen_addr: String,

    /// Seed node gossip URLs to dial on startup (comma-separated).
    #[arg(long, value_delimiter = ',')]
    seeds: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,emberchain=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("emberchain node starting");

    // ── Store + ledger ───────────────────────────────────────────────────
    let store = match &args.data_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating data dir {}", dir.display()))?;
            Store::open(dir).context("opening store")?
        }
        None => Store::open_temporary().context("opening in-memory store")?,
    };

    let mut ledger = Ledger::new(Some(store.clone()));
    ledger.initialize().context("initializing ledger")?;
    info!(height = ledger.chain().len(), "ledger loaded");

    let contracts = ContractManager::new(store);

    // ── Gossip network ───────────────────────────────────────────────────
    let gossip_config = GossipConfig::new(
        args.node_url.clone(),
        args.listen_addr.clone(),
        args.seeds.clone(),
    );
    let (network, gossip, mut events) =
        GossipNetwork::new(gossip_config, ledger.chain().len() as u64);
    gossip.update_chain(ledger.chain()).await;
    tokio::spawn(network.run());
    info!(node_url = %args.node_url, listen = %args.listen_addr, "gossip network started");

    // Mining is CPU-bound; guarding it with a mutex lets the command loop
    // keep servicing gossip events while a mine is in flight without two
    // chain mutations ever overlapping.
    let ledger = Arc::new(Mutex::new(ledger));
    let contracts = Arc::new(Mutex::new(contracts));

    print_help();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    info!("stdin closed, shutting down");
                    break;
                };
                if !handle_command(&line, &ledger, &contracts, &gossip).await {
                    break;
                }
            }
            event = events.recv() => {
                let Some(event) = event else {
                    warn!("gossip event channel closed");
                    break;
                };
                handle_gossip_event(event, &ledger, &gossip).await;
            }
        }
    }

    Ok(())
}

fn print_help() {
    println!(
        "commands: mine <miner_pub> | tx <sender_priv> <sender_pub> <receiver_pub> <amount> \
         | balance <pub> | status | peers | connect <peer_url> | sync \
         | deploy <deployer_pub> <source_file> \
         | call <address> <caller_pub> <value> <calldata_hex> | quit"
    );
}

/// Returns `false` when the loop should stop (operator asked to quit).
async fn handle_command(
    line: &str,
    ledger: &Arc<Mutex<Ledger>>,
    contracts: &Arc<Mutex<ContractManager>>,
    gossip: &emberchain_net::GossipHandle,
) -> bool {
    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else { return true };

    match cmd {
        "quit" | "exit" => return false,

        "help" => print_help(),

        "status" => {
            let ledger = ledger.lock().await;
            println!(
                "height={} pending={} valid={}",
                ledger.chain().len(),
                ledger.pending().len(),
                ledger.is_chain_valid()
            );
        }

        "peers" => {
            println!("connected={} known={:?}", gossip.peer_count().await, gossip.known_peer_urls().await);
        }

        "connect" => {
            let Some(url) = parts.next() else {
                warn!("usage: connect <peer_url>");
                return true;
            };
            gossip.connect_to_peer(url.to_string()).await;
        }

        "sync" => {
            gossip.sync_chain().await;
        }

        "balance" => {
            let Some(addr) = parts.next() else {
                warn!("usage: balance <pub>");
                return true;
            };
            let ledger = ledger.lock().await;
            println!("{}", ledger.balance(addr));
        }

        "mine" => {
            let Some(miner) = parts.next() else {
                warn!("usage: mine <miner_pub>");
                return true;
            };
            let mut ledger = ledger.lock().await;
            match ledger.mine_pending(PublicKeyHex::from(miner)) {
                Ok(block) => {
                    let block = block.clone();
                    gossip.update_chain(ledger.chain()).await;
                    gossip.broadcast_block(block).await;
                }
                Err(e) => warn!(error = %e, "mine failed"),
            }
        }

        "tx" => {
            let (Some(sender_priv), Some(sender_pub), Some(receiver), Some(amount)) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                warn!("usage: tx <sender_priv> <sender_pub> <receiver_pub> <amount>");
                return true;
            };
            let Ok(amount) = amount.parse::<u64>() else {
                warn!(amount, "not a valid amount");
                return true;
            };
            let mut tx = Transaction::new(
                Some(PublicKeyHex::from(sender_pub)),
                PublicKeyHex::from(receiver),
                amount,
            );
            if let Err(e) = tx.sign(sender_priv) {
                warn!(error = %e, "failed to sign transaction");
                return true;
            }
            let mut ledger = ledger.lock().await;
            match ledger.add_transaction(tx.clone()) {
                Ok(()) => gossip.broadcast_transaction(tx).await,
                Err(e) => warn!(error = %e, "transaction rejected"),
            }
        }

        "deploy" => {
            let (Some(deployer), Some(path)) = (parts.next(), parts.next()) else {
                warn!("usage: deploy <deployer_pub> <source_file>");
                return true;
            };
            let source = match std::fs::read_to_string(path) {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, path, "failed to read contract source");
                    return true;
                }
            };
            let now_ms = chrono::Utc::now().timestamp_millis();
            let mut contracts = contracts.lock().await;
            match contracts.deploy(
                PublicKeyHex::from(deployer),
                Code::Source(source),
                DEFAULT_GAS_LIMIT,
                now_ms,
            ) {
                Ok(outcome) => println!(
                    "deployed address={} success={} gas_used={}",
                    outcome.address, outcome.result.success, outcome.result.gas_used
                ),
                Err(e) => warn!(error = %e, "deploy failed"),
            }
        }

        "call" => {
            let (Some(address), Some(caller), Some(value), Some(calldata_hex)) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                warn!("usage: call <address> <caller_pub> <value> <calldata_hex>");
                return true;
            };
            let Ok(value) = value.parse::<u64>() else {
                warn!(value, "not a valid call value");
                return true;
            };
            let calldata = if calldata_hex == "-" {
                Vec::new()
            } else {
                match hex::decode(calldata_hex) {
                    Ok(d) => d,
                    Err(e) => {
                        warn!(error = %e, "calldata is not valid hex");
                        return true;
                    }
                }
            };
            let address = ContractAddress(address.to_string());
            let mut contracts = contracts.lock().await;
            match contracts.call(
                &address,
                PublicKeyHex::from(caller),
                value,
                calldata,
                DEFAULT_GAS_LIMIT,
            ) {
                Ok(result) => println!(
                    "success={} gas_used={} return_data={}",
                    result.success,
                    result.gas_used,
                    hex::encode(&result.return_data)
                ),
                Err(e) => warn!(error = %e, "call failed"),
            }
        }

        other => warn!(other, "unknown command, try 'help'"),
    }

    true
}

async fn handle_gossip_event(
    event: GossipEvent,
    ledger: &Arc<Mutex<Ledger>>,
    gossip: &emberchain_net::GossipHandle,
) {
    match event {
        GossipEvent::NewBlock(block) => {
            let mut ledger = ledger.lock().await;
            if block.index == ledger.tip().index && block.hash == ledger.tip().hash {
                return; // already have it
            }
            match ledger.add_block(block) {
                Ok(()) => gossip.update_chain(ledger.chain()).await,
                Err(e) => warn!(error = %e, "rejected block from peer"),
            }
        }
        GossipEvent::NewTx(tx) => {
            let mut ledger = ledger.lock().await;
            if let Err(e) = ledger.add_received_transaction(tx) {
                warn!(error = %e, "rejected transaction from peer");
            }
        }
        GossipEvent::Chain(blocks) => {
            let mut ledger = ledger.lock().await;
            if blocks.len() > ledger.chain().len() {
                match ledger.replace_chain(blocks) {
                    Ok(()) => gossip.update_chain(ledger.chain()).await,
                    Err(e) => warn!(error = %e, "rejected candidate chain from peer"),
                }
            }
        }
    }
}
