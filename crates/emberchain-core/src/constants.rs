//! ─── Emberchain Protocol Constants ──────────────────────────────────────────

// ── Consensus ────────────────────────────────────────────────────────────────

/// Required count of leading zero hex characters in a valid block hash.
/// Fixed for the lifetime of the chain — see `Non-goals`: no difficulty
/// retargeting.
pub const DIFFICULTY: usize = 4;

/// Amount credited to the miner of a block, as a sender-absent reward
/// transaction prepended to the block's transaction list.
pub const MINING_REWARD: u64 = 50;

/// `previous_hash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

// ── Gossip ───────────────────────────────────────────────────────────────────

/// Interval between reconnection sweeps over `known_peers`.
pub const RECONNECT_INTERVAL_SECS: u64 = 30;

/// Per-operation timeout for outbound connects and probes.
pub const CONNECT_TIMEOUT_SECS: u64 = 2;

/// Offset between a node's HTTP port and its gossip port in the default
/// deployment (`gossip_port = http_port + GOSSIP_PORT_OFFSET`). Any bijection
/// is acceptable provided seed lists agree — see component C6.
pub const GOSSIP_PORT_OFFSET: u16 = 1000;

/// Wire protocol version advertised in the `HANDSHAKE` message.
pub const PROTOCOL_VERSION: &str = "emberchain/1";

// ── VM ───────────────────────────────────────────────────────────────────────

/// Default gas ceiling for a single `execute` call.
pub const DEFAULT_GAS_LIMIT: u64 = 1_000_000;

/// Length in bytes of a VM word (256 bits).
pub const WORD_BYTES: usize = 32;
