// networking/src/lib.rs

//! P2P Networking Layer
//!
//! This crate implements the gossip overlay on plain TCP:
//! - Closed wire protocol, one JSON message per connection
//! - Peer directory (address book, last write wins)
//! - Request/response transport with connect and I/O timeouts
//! - Transaction and chain broadcast
//! - The `Node`: join/leave handshakes and inbound dispatch to the ledger

pub mod gossip;
pub mod p2p;
pub mod peer;
pub mod protocol;
pub mod transport;

pub use gossip::GossipService;
pub use p2p::{NetworkConfig, Node};
pub use peer::{PeerAddress, PeerDirectory};
pub use protocol::WireMessage;
pub use transport::{TcpTransport, Transport};

/// Result type for networking operations
pub type NetworkResult<T> = Result<T, NetworkError>;

/// Errors that can occur during networking operations
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Peer error: {0}")]
    PeerError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Message exceeds {0} bytes")]
    MessageTooLarge(usize),

    #[error("Task failed: {0}")]
    TaskFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ledger error: {0}")]
    Ledger(#[from] blockchain_core::BlockchainError),
}
