// networking/src/protocol.rs

use crate::{NetworkError, NetworkResult};
use blockchain_core::{Block, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every message exchanged between nodes.
///
/// Encoded as a JSON object whose `type` field names the variant.
/// Unknown types fail to decode and surface as `ProtocolError`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WireMessage {
    /// Ask for the receiver's full peer set
    PeersRequest,
    PeersReply {
        peers: BTreeMap<String, u16>,
    },
    /// Announce a joining node; answered with a `ChainSnapshot`
    NewPeer {
        address: String,
        port: u16,
    },
    Leave {
        address: String,
        port: u16,
    },
    NewTransaction {
        transaction: Transaction,
    },
    ChainSnapshot {
        blockchain: Vec<Block>,
    },
}

impl WireMessage {
    pub fn encode(&self) -> NetworkResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| NetworkError::SerializationError(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> NetworkResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| NetworkError::ProtocolError(e.to_string()))
    }

    /// Wire tag of this message
    pub fn kind(&self) -> &'static str {
        match self {
            WireMessage::PeersRequest => "PEERS_REQUEST",
            WireMessage::PeersReply { .. } => "PEERS_REPLY",
            WireMessage::NewPeer { .. } => "NEW_PEER",
            WireMessage::Leave { .. } => "LEAVE",
            WireMessage::NewTransaction { .. } => "NEW_TRANSACTION",
            WireMessage::ChainSnapshot { .. } => "CHAIN_SNAPSHOT",
        }
    }

    /// Whether the receiver answers on the same connection
    pub fn expects_reply(&self) -> bool {
        matches!(self, WireMessage::PeersRequest | WireMessage::NewPeer { .. })
    }
}
