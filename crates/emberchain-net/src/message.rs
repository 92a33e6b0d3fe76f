use emberchain_core::block::Block;
use emberchain_core::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// Wire messages exchanged over a gossip connection. Each is framed
/// independently (length-delimited, JSON body) — see component C6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GossipMessage {
    /// First message on any new connection, from either side.
    Handshake {
        node_url: String,
        chain_length: u64,
        version: String,
    },

    /// Request the sender's full chain.
    GetChain,

    /// The chain, as a response to `GetChain` or an unsolicited push.
    Chain { blocks: Vec<Block> },

    /// A newly mined or received block, broadcast to all peers.
    NewBlock { block: Block },

    /// A newly received transaction, broadcast to all peers.
    NewTx { transaction: Transaction },

    /// Request the sender's known peer URLs.
    GetPeers,

    /// A list of peer URLs, as a response to `GetPeers`.
    Peers { urls: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_round_trips_through_json() {
        let msg = GossipMessage::Handshake {
            node_url: "tcp://127.0.0.1:8001".to_string(),
            chain_length: 3,
            version: "emberchain/1".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: GossipMessage = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, GossipMessage::Handshake { chain_length: 3, .. }));
    }

    #[test]
    fn wire_shape_uses_type_and_data_tags() {
        let msg = GossipMessage::GetChain;
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "GET_CHAIN");
    }

    #[test]
    fn unknown_fields_in_data_are_ignored() {
        let json = r#"{"type":"GET_PEERS","data":{"unused":true}}"#;
        let msg: GossipMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, GossipMessage::GetPeers));
    }
}
