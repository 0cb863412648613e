// blockchain-core/src/lib.rs

//! Core ledger data structures and logic
//!
//! This crate provides:
//! - Signed value-transfer transactions
//! - Blocks with proof-of-work and cooperative cancellation
//! - Immutable chain snapshots and the longest-valid-chain rule
//! - The `Ledger`: mempool, mining orchestration and chain replacement

pub mod block;
pub mod chain;
pub mod fork;
pub mod ledger;
pub mod mempool;
pub mod miner;
pub mod transaction;
pub mod types;

pub use block::Block;
pub use chain::Chain;
pub use fork::ForkChoice;
pub use ledger::{ChainListener, Ledger, LedgerConfig, ReplaceOutcome, SubmitOutcome};
pub use mempool::{Mempool, PoolMetrics};
pub use miner::{CancelToken, MiningOutcome};
pub use transaction::Transaction;
pub use types::*;

/// Result type for ledger operations
pub type BlockchainResult<T> = Result<T, BlockchainError>;

/// Errors that can occur in ledger operations
#[derive(Debug, thiserror::Error)]
pub enum BlockchainError {
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    #[error("Invalid chain: {0}")]
    InvalidChain(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cryptographic error: {0}")]
    Crypto(#[from] blockchain_crypto::CryptoError),

    #[error("Mining thread error: {0}")]
    Mining(String),
}
