// blockchain-core/src/miner.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag for one mining attempt.
///
/// Clones share the same flag. The miner polls it once per nonce.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// How a proof-of-work search ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiningOutcome {
    /// The block hash now satisfies the difficulty
    Found,
    /// The token was set before a solution was found
    Cancelled,
}

impl MiningOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, MiningOutcome::Found)
    }
}
