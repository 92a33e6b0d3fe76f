use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, info, warn};

use emberchain_core::block::Block;
use emberchain_core::transaction::Transaction;

use crate::config::GossipConfig;
use crate::message::GossipMessage;

/// An event delivered up to the application: something a peer sent us.
#[derive(Debug)]
pub enum GossipEvent {
    Chain(Vec<Block>),
    NewBlock(Block),
    NewTx(Transaction),
}

enum GossipCommand {
    BroadcastBlock(Block),
    BroadcastTx(Transaction),
    ConnectToPeer(String),
    SyncChain,
}

pub(crate) struct Shared {
    config: GossipConfig,
    peers: Mutex<HashMap<String, mpsc::Sender<GossipMessage>>>,
    known_peers: Mutex<HashSet<String>>,
    chain_length: AtomicU64,
    chain_snapshot: Mutex<Vec<Block>>,
}

/// Application-facing handle. Clone freely — broadcasts and chain-state
/// updates are routed through shared, mutex-protected state.
#[derive(Clone)]
pub struct GossipHandle {
    shared: Arc<Shared>,
    command_tx: mpsc::Sender<GossipCommand>,
}

impl GossipHandle {
    pub async fn broadcast_block(&self, block: Block) {
        let _ = self
            .command_tx
            .send(GossipCommand::BroadcastBlock(block))
            .await;
    }

    pub async fn broadcast_transaction(&self, tx: Transaction) {
        let _ = self.command_tx.send(GossipCommand::BroadcastTx(tx)).await;
    }

    /// Tell the network our current chain length (advertised in future
    /// `HANDSHAKE`s) and cache a snapshot of the chain itself (served to
    /// peers that send `GET_CHAIN`).
    pub async fn update_chain(&self, chain: &[Block]) {
        self.shared
            .chain_length
            .store(chain.len() as u64, Ordering::Relaxed);
        *self.shared.chain_snapshot.lock().await = chain.to_vec();
    }

    pub async fn peer_count(&self) -> usize {
        self.shared.peers.lock().await.len()
    }

    pub async fn known_peer_urls(&self) -> Vec<String> {
        self.shared.known_peers.lock().await.iter().cloned().collect()
    }

    /// Dial `url` immediately, outside the periodic reconnect timer —
    /// the façade-facing `connect_to_peer` operation (§6.4).
    pub async fn connect_to_peer(&self, url: String) {
        let _ = self.command_tx.send(GossipCommand::ConnectToPeer(url)).await;
    }

    /// Ask every connected peer for their chain — the façade-facing
    /// `sync_chain` operation (§6.4). Responses arrive as ordinary
    /// `GossipEvent::Chain` events on the event channel.
    pub async fn sync_chain(&self) {
        let _ = self.command_tx.send(GossipCommand::SyncChain).await;
    }
}

/// Owns the gossip server's background tasks. Pass to
/// `tokio::spawn(network.run())`.
pub struct GossipNetwork {
    shared: Arc<Shared>,
    command_rx: mpsc::Receiver<GossipCommand>,
    event_tx: mpsc::Sender<GossipEvent>,
}

impl GossipNetwork {
    pub fn new(config: GossipConfig, chain_length: u64) -> (Self, GossipHandle, mpsc::Receiver<GossipEvent>) {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (event_tx, event_rx) = mpsc::channel(256);
        let shared = Arc::new(Shared {
            config,
            peers: Mutex::new(HashMap::new()),
            known_peers: Mutex::new(HashSet::new()),
            chain_length: AtomicU64::new(chain_length),
            chain_snapshot: Mutex::new(Vec::new()),
        });
        let network = GossipNetwork {
            shared: shared.clone(),
            command_rx,
            event_tx,
        };
        let handle = GossipHandle { shared, command_tx };
        (network, handle, event_rx)
    }

    /// Bind the listener, spawn the accept loop, seed-dial task, and
    /// reconnection timer, then drive the broadcast command loop. Runs
    /// until the command channel closes.
    pub async fn run(mut self) {
        let listener = match TcpListener::bind(&self.shared.config.listen_addr).await {
            Ok(l) => l,
            Err(e) => {
                warn!(error = %e, addr = %self.shared.config.listen_addr, "gossip listener bind failed");
                return;
            }
        };
        info!(addr = %self.shared.config.listen_addr, "gossip listening");

        spawn_acceptor(listener, self.shared.clone(), self.event_tx.clone());
        spawn_seed_dialer(self.shared.clone(), self.event_tx.clone());
        spawn_reconnect_timer(self.shared.clone(), self.event_tx.clone());

        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                GossipCommand::BroadcastBlock(block) => {
                    broadcast(&self.shared, GossipMessage::NewBlock { block }).await;
                }
                GossipCommand::BroadcastTx(tx) => {
                    broadcast(
                        &self.shared,
                        GossipMessage::NewTx { transaction: tx },
                    )
                    .await;
                }
                GossipCommand::ConnectToPeer(url) => {
                    if url != self.shared.config.node_url {
                        connect_to(url, self.shared.clone(), self.event_tx.clone()).await;
                    }
                }
                GossipCommand::SyncChain => {
                    broadcast(&self.shared, GossipMessage::GetChain).await;
                }
            }
        }
    }
}

fn spawn_acceptor(listener: TcpListener, shared: Arc<Shared>, event_tx: mpsc::Sender<GossipEvent>) {
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    debug!(%addr, "inbound gossip connection");
                    let shared = shared.clone();
                    let event_tx = event_tx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, shared, event_tx).await {
                            debug!(error = %e, "inbound connection closed");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "accept failed"),
            }
        }
    });
}

fn spawn_seed_dialer(shared: Arc<Shared>, event_tx: mpsc::Sender<GossipEvent>) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        let seeds = shared.config.seed_nodes.clone();
        for url in seeds {
            if url == shared.config.node_url {
                continue;
            }
            connect_to(url, shared.clone(), event_tx.clone()).await;
        }
    });
}

fn spawn_reconnect_timer(shared: Arc<Shared>, event_tx: mpsc::Sender<GossipEvent>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(shared.config.reconnect_interval_secs));
        loop {
            ticker.tick().await;
            let targets: Vec<String> = {
                let known = shared.known_peers.lock().await;
                let connected = shared.peers.lock().await;
                known
                    .iter()
                    .filter(|u| !connected.contains_key(*u) && **u != shared.config.node_url)
                    .cloned()
                    .collect()
            };
            for url in targets {
                connect_to(url, shared.clone(), event_tx.clone()).await;
            }
        }
    });
}

/// Dial `url` (`"tcp://host:port"`) with a timeout; on success, hand the
/// stream to the same connection handler used for inbound peers.
async fn connect_to(url: String, shared: Arc<Shared>, event_tx: mpsc::Sender<GossipEvent>) {
    let Some(addr) = url.strip_prefix("tcp://") else {
        warn!(url, "gossip peer URL missing tcp:// scheme");
        return;
    };
    let timeout = Duration::from_secs(shared.config.connect_timeout_secs);
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            debug!(url, "outbound gossip connection established");
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, shared, event_tx).await {
                    debug!(url, error = %e, "outbound connection closed");
                }
            });
        }
        Ok(Err(e)) => debug!(url, error = %e, "gossip connect failed"),
        Err(_) => debug!(url, "gossip connect timed out"),
    }
}

async fn broadcast(shared: &Arc<Shared>, message: GossipMessage) {
    let peers = shared.peers.lock().await;
    for (url, tx) in peers.iter() {
        if tx.send(message.clone()).await.is_err() {
            debug!(url, "broadcast send failed, peer will be dropped on next close");
        }
    }
}

type Frame = Framed<TcpStream, LengthDelimitedCodec>;

fn encode(message: &GossipMessage) -> Vec<u8> {
    serde_json::to_vec(message).expect("GossipMessage serialization is infallible")
}

async fn send_frame(frame: &mut Frame, message: &GossipMessage) -> std::io::Result<()> {
    frame.send(encode(message).into()).await
}

/// Owns one peer connection from handshake to close. Handles both
/// inbound and outbound connections identically once the TCP stream
/// exists.
async fn handle_connection(
    stream: TcpStream,
    shared: Arc<Shared>,
    event_tx: mpsc::Sender<GossipEvent>,
) -> Result<(), std::io::Error> {
    let mut frame: Frame = Framed::new(stream, LengthDelimitedCodec::new());

    let our_handshake = GossipMessage::Handshake {
        node_url: shared.config.node_url.clone(),
        chain_length: shared.chain_length.load(Ordering::Relaxed),
        version: shared.config.protocol_version.clone(),
    };
    send_frame(&mut frame, &our_handshake).await?;

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<GossipMessage>(64);
    let mut registered_as: Option<String> = None;

    loop {
        tokio::select! {
            maybe_out = outbound_rx.recv() => {
                match maybe_out {
                    Some(msg) => send_frame(&mut frame, &msg).await?,
                    None => break,
                }
            }
            maybe_in = frame.next() => {
                let Some(bytes) = maybe_in else { break };
                let bytes = bytes?;
                let message: GossipMessage = match serde_json::from_slice(&bytes) {
                    Ok(m) => m,
                    Err(e) => {
                        debug!(error = %e, "malformed gossip frame, dropping connection");
                        break;
                    }
                };

                match message {
                    GossipMessage::Handshake { node_url, chain_length, version } => {
                        if node_url == shared.config.node_url {
                            debug!("rejecting self connection");
                            break;
                        }
                        debug!(node_url, chain_length, version, "gossip handshake");
                        shared.peers.lock().await.insert(node_url.clone(), outbound_tx.clone());
                        shared.known_peers.lock().await.insert(node_url.clone());
                        registered_as = Some(node_url);

                        if chain_length > shared.chain_length.load(Ordering::Relaxed) {
                            let _ = outbound_tx.send(GossipMessage::GetChain).await;
                        }
                        let _ = outbound_tx.send(GossipMessage::GetPeers).await;
                    }

                    GossipMessage::GetChain => {
                        let blocks = shared.chain_snapshot.lock().await.clone();
                        let _ = outbound_tx.send(GossipMessage::Chain { blocks }).await;
                    }

                    GossipMessage::Chain { blocks } => {
                        let _ = event_tx.send(GossipEvent::Chain(blocks)).await;
                    }

                    GossipMessage::NewBlock { block } => {
                        let _ = event_tx.send(GossipEvent::NewBlock(block)).await;
                    }

                    GossipMessage::NewTx { transaction } => {
                        let _ = event_tx.send(GossipEvent::NewTx(transaction)).await;
                    }

                    GossipMessage::GetPeers => {
                        let urls: Vec<String> = shared.known_peers.lock().await.iter().cloned().collect();
                        let _ = outbound_tx.send(GossipMessage::Peers { urls }).await;
                    }

                    GossipMessage::Peers { urls } => {
                        let mut known = shared.known_peers.lock().await;
                        for url in urls {
                            if url != shared.config.node_url {
                                known.insert(url);
                            }
                        }
                    }
                }
            }
        }
    }

    if let Some(node_url) = registered_as {
        shared.peers.lock().await.remove(&node_url);
        debug!(node_url, "gossip connection closed, peer dropped from table");
    }
    Ok(())
}
