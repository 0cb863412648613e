// blockchain-core/src/block.rs

use crate::{
    miner::{CancelToken, MiningOutcome},
    transaction::Transaction,
    types::*,
    BlockchainError, BlockchainResult,
};
use blockchain_crypto::{sha256_hex, HASH_HEX_LEN};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A batch of transactions linked to its predecessor by hash and sealed
/// by a proof-of-work nonce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain, genesis is 0
    pub index: BlockIndex,
    /// Hex hash of the predecessor, `"0"` for genesis
    pub previous_hash: String,
    pub timestamp: Timestamp,
    /// Ordered transactions; named `data` on the wire
    #[serde(rename = "data")]
    pub transactions: Vec<Transaction>,
    /// Hex SHA-256 over the other fields
    pub hash: String,
    pub nonce: Nonce,
}

impl Block {
    /// Create a candidate block with nonce 0 and its hash filled in
    pub fn new(
        index: BlockIndex,
        previous_hash: impl Into<String>,
        timestamp: Timestamp,
        transactions: Vec<Transaction>,
    ) -> Self {
        let mut block = Self {
            index,
            previous_hash: previous_hash.into(),
            timestamp,
            transactions,
            hash: String::new(),
            nonce: 0,
        };
        block.hash = block.compute_hash();
        block
    }

    /// The fixed first block shared by every chain
    pub fn genesis() -> Self {
        Self::new(0, GENESIS_PREVIOUS_HASH, 0.0, Vec::new())
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash == GENESIS_PREVIOUS_HASH
    }

    /// Hash over index, previous hash, timestamp, transactions and nonce
    pub fn compute_hash(&self) -> String {
        let mut preimage = format!("{}{}{}", self.index, self.previous_hash, self.timestamp);
        for tx in &self.transactions {
            preimage.push_str(&tx.hash_payload());
        }
        preimage.push_str(&self.nonce.to_string());
        sha256_hex(preimage.as_bytes())
    }

    /// Whether `hash` starts with `difficulty` hex zeros
    pub fn meets_difficulty(&self, difficulty: Difficulty) -> bool {
        difficulty <= HASH_HEX_LEN
            && self.hash.len() >= difficulty
            && self.hash.bytes().take(difficulty).all(|b| b == b'0')
    }

    /// Search nonces until the hash meets `difficulty` or `cancel` is set.
    ///
    /// The token is polled before every hash computation.
    pub fn mine(&mut self, difficulty: Difficulty, cancel: &CancelToken) -> MiningOutcome {
        loop {
            if cancel.is_cancelled() {
                return MiningOutcome::Cancelled;
            }
            if self.meets_difficulty(difficulty) {
                return MiningOutcome::Found;
            }
            self.nonce = self.nonce.wrapping_add(1);
            self.hash = self.compute_hash();
        }
    }

    /// Check linkage, proof-of-work and hash integrity against `previous`
    pub fn check(&self, previous: &Block, difficulty: Difficulty) -> BlockchainResult<()> {
        if self.previous_hash != previous.hash {
            return Err(BlockchainError::InvalidBlock(format!(
                "block {} does not link to {}",
                self.index, previous.hash
            )));
        }

        if !self.meets_difficulty(difficulty) {
            return Err(BlockchainError::InvalidBlock(format!(
                "block {} lacks {} leading zeros",
                self.index, difficulty
            )));
        }

        if self.hash != self.compute_hash() {
            return Err(BlockchainError::InvalidBlock(format!(
                "block {} hash mismatch",
                self.index
            )));
        }

        Ok(())
    }

    pub fn validate(&self, previous: &Block, difficulty: Difficulty) -> bool {
        self.check(previous, difficulty).is_ok()
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Block #{}", self.index)?;
        writeln!(f, "  Hash: {}", self.hash)?;
        writeln!(f, "  Previous: {}", self.previous_hash)?;
        writeln!(f, "  Timestamp: {}", self.timestamp)?;
        writeln!(f, "  Nonce: {}", self.nonce)?;
        write!(f, "  Transactions: {}", self.transactions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn mined_child(previous: &Block, difficulty: Difficulty) -> Block {
        let mut block = Block::new(previous.index + 1, previous.hash.clone(), 1.5, vec![]);
        assert_eq!(block.mine(difficulty, &CancelToken::new()), MiningOutcome::Found);
        block
    }

    #[test]
    fn test_hash_preimage_layout() {
        // sha256("0" + "0" + "0" + "0"): index, previous hash, timestamp, nonce
        assert_eq!(
            Block::genesis().hash,
            "9af15b336e6a9619928537df30b2e6a2376569fcf9d7e773eccede65606529a0"
        );
    }

    #[test]
    fn test_genesis_block() {
        let genesis = Block::genesis();
        assert_eq!(genesis.index, 0);
        assert!(genesis.is_genesis());
        assert!(genesis.transactions.is_empty());
        assert_eq!(genesis, Block::genesis());
        assert_eq!(genesis.hash.len(), HASH_HEX_LEN);
    }

    #[test]
    fn test_mining_meets_difficulty() {
        let genesis = Block::genesis();
        let block = mined_child(&genesis, 2);

        assert!(block.hash.starts_with("00"));
        assert_eq!(block.hash, block.compute_hash());
        assert!(block.validate(&genesis, 2));
    }

    #[test]
    fn test_cancelled_before_start() {
        let mut block = Block::new(1, Block::genesis().hash, 1.0, vec![]);
        let cancel = CancelToken::new();
        cancel.cancel();

        assert_eq!(block.mine(6, &cancel), MiningOutcome::Cancelled);
        assert_eq!(block.nonce, 0);
    }

    #[test]
    fn test_validation_rejects_wrong_parent() {
        let genesis = Block::genesis();
        let block = mined_child(&genesis, 1);
        let unrelated = Block::new(0, "ff", 0.0, vec![]);

        let err = block.check(&unrelated, 1).unwrap_err();
        assert!(err.to_string().contains("does not link"));
    }

    #[test]
    fn test_validation_rejects_insufficient_work() {
        let genesis = Block::genesis();
        let block = mined_child(&genesis, 1);
        let leading = block.hash.bytes().take_while(|b| *b == b'0').count();

        assert!(!block.validate(&genesis, leading + 1));
        assert!(!block.meets_difficulty(HASH_HEX_LEN + 1));
    }

    #[test]
    fn test_validation_rejects_tampered_fields() {
        let genesis = Block::genesis();
        let mut block = mined_child(&genesis, 1);
        block.timestamp += 10.0;

        assert!(!block.validate(&genesis, 1));
    }

    #[test]
    fn test_wire_field_names() {
        let json = serde_json::to_value(Block::genesis()).unwrap();
        assert!(json.get("data").is_some());
        assert!(json.get("transactions").is_none());

        let back: Block = serde_json::from_value(json).unwrap();
        assert_eq!(back.hash, back.compute_hash());
    }

    proptest! {
        #[test]
        fn prop_changing_nonce_breaks_integrity(delta in 1u64..u64::MAX) {
            let genesis = Block::genesis();
            let mut block = mined_child(&genesis, 1);
            block.nonce = block.nonce.wrapping_add(delta);
            prop_assert!(block.hash != block.compute_hash());
            prop_assert!(!block.validate(&genesis, 0));
        }
    }
}
