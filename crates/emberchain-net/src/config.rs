use emberchain_core::constants::{CONNECT_TIMEOUT_SECS, PROTOCOL_VERSION, RECONNECT_INTERVAL_SECS};

/// Configuration for the gossip network.
#[derive(Debug, Clone)]
pub struct GossipConfig {
    /// This node's externally-reachable URL, e.g. `"tcp://127.0.0.1:8001"`.
    /// Used for self-connection rejection and advertised in `HANDSHAKE`.
    pub node_url: String,
    /// Local address to bind the listener to, e.g. `"0.0.0.0:8001"`.
    pub listen_addr: String,
    /// Seed node URLs to dial on startup (excluding self).
    pub seed_nodes: Vec<String>,
    /// Protocol version string advertised in `HANDSHAKE`.
    pub protocol_version: String,
    /// Interval between reconnection sweeps over `known_peers`.
    pub reconnect_interval_secs: u64,
    /// Timeout for a single outbound connect attempt.
    pub connect_timeout_secs: u64,
}

impl GossipConfig {
    pub fn new(node_url: String, listen_addr: String, seed_nodes: Vec<String>) -> Self {
        Self {
            node_url,
            listen_addr,
            seed_nodes,
            protocol_version: PROTOCOL_VERSION.to_string(),
            reconnect_interval_secs: RECONNECT_INTERVAL_SECS,
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_fills_in_protocol_defaults() {
        let cfg = GossipConfig::new(
            "tcp://127.0.0.1:8001".to_string(),
            "0.0.0.0:8001".to_string(),
            vec!["tcp://127.0.0.1:8002".to_string()],
        );
        assert_eq!(cfg.protocol_version, PROTOCOL_VERSION);
        assert_eq!(cfg.reconnect_interval_secs, RECONNECT_INTERVAL_SECS);
        assert_eq!(cfg.connect_timeout_secs, CONNECT_TIMEOUT_SECS);
        assert_eq!(cfg.seed_nodes, vec!["tcp://127.0.0.1:8002".to_string()]);
    }
}
