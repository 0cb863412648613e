// blockchain-core/src/ledger.rs

use crate::{
    block::Block,
    chain::Chain,
    fork::ForkChoice,
    mempool::{Mempool, PoolMetrics},
    miner::{CancelToken, MiningOutcome},
    transaction::Transaction,
    types::*,
    BlockchainError, BlockchainResult,
};
use blockchain_crypto::{Signer, HASH_HEX_LEN};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use tracing::{debug, error, info, warn};

/// Callback invoked with the new chain after a locally mined block is appended
pub type ChainListener = Arc<dyn Fn(Arc<Chain>) + Send + Sync>;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Leading hex zeros required of every non-genesis block hash
    pub difficulty: Difficulty,
    /// Mempool size that triggers a mining attempt
    pub mining_threshold: usize,
    pub fork_choice: ForkChoice,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            mining_threshold: DEFAULT_MINING_THRESHOLD,
            fork_choice: ForkChoice::default(),
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> BlockchainResult<()> {
        if self.difficulty > HASH_HEX_LEN {
            return Err(BlockchainError::InvalidConfig(format!(
                "difficulty {} exceeds hash length {}",
                self.difficulty, HASH_HEX_LEN
            )));
        }
        if self.mining_threshold == 0 {
            return Err(BlockchainError::InvalidConfig(
                "mining threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Result of a successful submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Newly added to the mempool
    Accepted,
    /// Already pending or already in the chain
    Duplicate,
}

/// Result of offering a candidate chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// Candidate was not longer; local chain untouched
    Kept,
    Replaced {
        previous_len: usize,
        new_len: usize,
        /// An in-flight mining attempt was cancelled
        cancelled_mining: bool,
        /// Pending transactions dropped because the new chain contains them
        reconciled: usize,
    },
}

impl ReplaceOutcome {
    pub fn is_replaced(&self) -> bool {
        matches!(self, ReplaceOutcome::Replaced { .. })
    }
}

struct MiningJob {
    id: u64,
    cancel: CancelToken,
}

struct LedgerState {
    chain: Arc<Chain>,
    mempool: Mempool,
    mining: Option<MiningJob>,
    next_job_id: u64,
}

/// Owns the chain and mempool of one node.
///
/// All chain and mempool mutation happens under a single lock. Mining runs
/// on its own thread outside the lock and re-validates its block against
/// the current tip before appending.
pub struct Ledger {
    config: LedgerConfig,
    signer: Arc<dyn Signer>,
    listener: Option<ChainListener>,
    state: Mutex<LedgerState>,
}

impl Ledger {
    /// Create a ledger holding only the genesis block
    pub fn new(
        config: LedgerConfig,
        signer: Arc<dyn Signer>,
        listener: Option<ChainListener>,
    ) -> BlockchainResult<Arc<Self>> {
        config.validate()?;

        Ok(Arc::new(Self {
            config,
            signer,
            listener,
            state: Mutex::new(LedgerState {
                chain: Arc::new(Chain::genesis()),
                mempool: Mempool::new(),
                mining: None,
                next_job_id: 0,
            }),
        }))
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn difficulty(&self) -> Difficulty {
        self.config.difficulty
    }

    /// Current chain version
    pub fn chain(&self) -> Arc<Chain> {
        Arc::clone(&self.state().chain)
    }

    /// Pending transactions in arrival order
    pub fn mempool(&self) -> Vec<Transaction> {
        self.state().mempool.snapshot()
    }

    pub fn pool_metrics(&self) -> PoolMetrics {
        self.state().mempool.metrics()
    }

    pub fn is_mining(&self) -> bool {
        self.state().mining.is_some()
    }

    /// Validate `tx` and add it to the mempool, starting a mining attempt
    /// once the pool reaches the threshold and no attempt is running.
    pub fn submit_transaction(self: &Arc<Self>, tx: Transaction) -> BlockchainResult<SubmitOutcome> {
        tx.verify(self.signer.as_ref())?;

        let job = {
            let mut state = self.state();
            if state.chain.contains_transaction(&tx) || !state.mempool.insert(tx) {
                return Ok(SubmitOutcome::Duplicate);
            }
            self.prepare_mining(&mut state)
        };

        if let Some((id, block, cancel)) = job {
            if let Err(e) = self.spawn_miner(id, block, cancel) {
                error!("Failed to start mining: {}", e);
                let mut state = self.state();
                if state.mining.as_ref().is_some_and(|job| job.id == id) {
                    state.mining = None;
                }
            }
        }

        Ok(SubmitOutcome::Accepted)
    }

    fn prepare_mining(&self, state: &mut LedgerState) -> Option<(u64, Block, CancelToken)> {
        if state.mining.is_some() || state.mempool.len() < self.config.mining_threshold {
            return None;
        }

        let tip = state.chain.tip();
        let block = Block::new(tip.index + 1, tip.hash.clone(), now(), state.mempool.snapshot());

        let id = state.next_job_id;
        state.next_job_id += 1;
        let cancel = CancelToken::new();
        state.mining = Some(MiningJob {
            id,
            cancel: cancel.clone(),
        });

        debug!(
            "Prepared candidate block {} with {} transactions",
            block.index,
            block.transactions.len()
        );
        Some((id, block, cancel))
    }

    fn spawn_miner(self: &Arc<Self>, id: u64, mut block: Block, cancel: CancelToken) -> BlockchainResult<()> {
        let ledger = Arc::clone(self);
        let difficulty = self.config.difficulty;

        thread::Builder::new()
            .name(format!("miner-{}", id))
            .spawn(move || {
                let outcome = block.mine(difficulty, &cancel);
                ledger.finish_mining(id, block, outcome);
            })
            .map_err(|e| BlockchainError::Mining(e.to_string()))?;

        info!("⛏ Mining started (job {})", id);
        Ok(())
    }

    fn finish_mining(&self, id: u64, block: Block, outcome: MiningOutcome) {
        let chain = {
            let mut state = self.state();
            let current = state.mining.as_ref().is_some_and(|job| job.id == id);
            if current {
                state.mining = None;
            }

            if outcome == MiningOutcome::Cancelled {
                debug!("Mining job {} cancelled", id);
                return;
            }
            if !current {
                debug!("Mining job {} superseded, discarding block", id);
                return;
            }

            let tip = state.chain.tip();
            if block.index != tip.index + 1 {
                warn!("Mined block {} no longer extends tip {}", block.index, tip.index);
                return;
            }
            if let Err(e) = block.check(tip, self.config.difficulty) {
                warn!("Discarding stale mined block: {}", e);
                return;
            }
            if !state.mempool.contains_all(&block.transactions) {
                warn!("Discarding mined block {}: transactions already consumed", block.index);
                return;
            }

            state.mempool.remove_all(&block.transactions);
            let chain = Arc::new(state.chain.with_block(block));
            state.chain = Arc::clone(&chain);
            chain
        };

        info!("✓ Mined block {} ({})", chain.tip().index, chain.tip().hash);
        if let Some(listener) = &self.listener {
            listener(chain);
        }
    }

    /// Adopt `blocks` if they form a valid chain preferred by the fork rule.
    ///
    /// An invalid candidate returns `InvalidChain` and leaves the ledger as it was.
    pub fn compare_and_replace(&self, blocks: Vec<Block>) -> BlockchainResult<ReplaceOutcome> {
        let fork_choice = self.config.fork_choice;
        if !fork_choice.prefers(self.chain().len(), blocks.len()) {
            return Ok(ReplaceOutcome::Kept);
        }

        let candidate = Chain::from_blocks(blocks)?;
        candidate.validate(self.config.difficulty)?;

        let outcome = {
            let mut state = self.state();
            // the local chain may have grown while validating
            let previous_len = state.chain.len();
            if !fork_choice.prefers(previous_len, candidate.len()) {
                return Ok(ReplaceOutcome::Kept);
            }

            let cancelled_mining = match state.mining.take() {
                Some(job) => {
                    job.cancel.cancel();
                    true
                }
                None => false,
            };

            let chain = Arc::new(candidate);
            state.chain = Arc::clone(&chain);
            let reconciled = state.mempool.remove_included(&chain);

            ReplaceOutcome::Replaced {
                previous_len,
                new_len: chain.len(),
                cancelled_mining,
                reconciled,
            }
        };

        info!("✓ Chain replaced: {:?}", outcome);
        Ok(outcome)
    }

    /// Cancel any in-flight mining attempt
    pub fn stop_mining(&self) {
        if let Some(job) = self.state().mining.take() {
            job.cancel.cancel();
            debug!("Mining job {} stopped", job.id);
        }
    }
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        writeln!(f, "Chain length: {}", state.chain.len())?;
        writeln!(f, "Tip: {}", state.chain.tip().hash)?;
        writeln!(f, "Pending transactions: {}", state.mempool.len())?;
        write!(f, "Mining: {}", state.mining.is_some())
    }
}
