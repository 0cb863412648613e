// blockchain-core/src/mempool.rs

use crate::{chain::Chain, transaction::Transaction};

/// Pool counters since the ledger started
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolMetrics {
    pub pending_count: usize,
    pub total_added: u64,
    pub total_removed: u64,
}

/// Pending transactions in arrival order.
///
/// Membership uses [`Transaction`] equality, so a re-signed copy of a
/// pending transaction is the same entry while one with a different
/// timestamp is a new entry.
#[derive(Debug, Clone, Default)]
pub struct Mempool {
    transactions: Vec<Transaction>,
    total_added: u64,
    total_removed: u64,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `tx` unless an equal transaction is already pending.
    /// Returns whether the pool changed.
    pub fn insert(&mut self, tx: Transaction) -> bool {
        if self.contains(&tx) {
            return false;
        }
        self.transactions.push(tx);
        self.total_added += 1;
        true
    }

    pub fn contains(&self, tx: &Transaction) -> bool {
        self.transactions.iter().any(|t| t == tx)
    }

    pub fn contains_all<'a>(&self, txs: impl IntoIterator<Item = &'a Transaction>) -> bool {
        txs.into_iter().all(|tx| self.contains(tx))
    }

    /// Remove every pending transaction equal to one in `txs`
    pub fn remove_all<'a>(&mut self, txs: impl IntoIterator<Item = &'a Transaction>) -> usize {
        let txs: Vec<&Transaction> = txs.into_iter().collect();
        let before = self.transactions.len();
        self.transactions.retain(|pending| !txs.iter().any(|tx| *tx == pending));
        let removed = before - self.transactions.len();
        self.total_removed += removed as u64;
        removed
    }

    /// Drop everything already recorded in `chain`
    pub fn remove_included(&mut self, chain: &Chain) -> usize {
        let included = chain.blocks().iter().flat_map(|b| b.transactions.iter());
        self.remove_all(included)
    }

    /// Copy of the pending transactions in arrival order
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.transactions.clone()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            pending_count: self.transactions.len(),
            total_added: self.total_added,
            total_removed: self.total_removed,
        }
    }
}
