//! emberchain-net
//!
//! Gossip networking layer for emberchain nodes: plain TCP connections
//! carrying independently length-framed JSON messages. No transport
//! encryption or peer authentication — see the design notes on this.

pub mod config;
pub mod message;
pub mod network;

pub use config::GossipConfig;
pub use message::GossipMessage;
pub use network::{GossipEvent, GossipHandle, GossipNetwork};
