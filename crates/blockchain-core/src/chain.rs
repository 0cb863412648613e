// blockchain-core/src/chain.rs

use crate::{block::Block, transaction::Transaction, types::*, BlockchainError, BlockchainResult};

/// An immutable, non-empty sequence of blocks starting at genesis.
///
/// The ledger never mutates a `Chain` in place; growth produces a new
/// version via [`Chain::with_block`] and replacement swaps the whole value.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Chain {
    /// A chain holding only the genesis block
    pub fn genesis() -> Self {
        Self {
            blocks: vec![Block::genesis()],
        }
    }

    /// Wrap decoded blocks; structure is checked by [`Chain::validate`]
    pub fn from_blocks(blocks: Vec<Block>) -> BlockchainResult<Self> {
        if blocks.is_empty() {
            return Err(BlockchainError::InvalidChain("chain is empty".into()));
        }
        Ok(Self { blocks })
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Never true for a constructed chain
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Last block of the chain
    pub fn tip(&self) -> &Block {
        // from_blocks and genesis both guarantee at least one block
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn to_blocks(&self) -> Vec<Block> {
        self.blocks.clone()
    }

    /// Whether any block carries a transaction equal to `tx`
    pub fn contains_transaction(&self, tx: &Transaction) -> bool {
        self.blocks
            .iter()
            .any(|block| block.transactions.iter().any(|t| t == tx))
    }

    /// New chain version with `block` appended
    pub fn with_block(&self, block: Block) -> Self {
        let mut blocks = Vec::with_capacity(self.blocks.len() + 1);
        blocks.extend_from_slice(&self.blocks);
        blocks.push(block);
        Self { blocks }
    }

    /// Validate the whole chain block by block
    pub fn validate(&self, difficulty: Difficulty) -> BlockchainResult<()> {
        let genesis = &self.blocks[0];
        if *genesis != Block::genesis() {
            return Err(BlockchainError::InvalidChain(
                "first block is not the genesis block".into(),
            ));
        }

        for pair in self.blocks.windows(2) {
            let (previous, block) = (&pair[0], &pair[1]);
            if block.index != previous.index + 1 {
                return Err(BlockchainError::InvalidChain(format!(
                    "expected index {}, got {}",
                    previous.index + 1,
                    block.index
                )));
            }
            block
                .check(previous, difficulty)
                .map_err(|e| BlockchainError::InvalidChain(e.to_string()))?;
        }

        Ok(())
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::genesis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::CancelToken;

    fn extend(chain: &Chain, difficulty: Difficulty) -> Chain {
        let tip = chain.tip();
        let mut block = Block::new(tip.index + 1, tip.hash.clone(), now(), vec![]);
        block.mine(difficulty, &CancelToken::new());
        chain.with_block(block)
    }

    #[test]
    fn test_genesis_chain() {
        let chain = Chain::genesis();
        assert_eq!(chain.len(), 1);
        assert!(chain.tip().is_genesis());
        assert!(chain.validate(4).is_ok());
    }

    #[test]
    fn test_with_block_leaves_original() {
        let chain = Chain::genesis();
        let longer = extend(&chain, 1);

        assert_eq!(chain.len(), 1);
        assert_eq!(longer.len(), 2);
        assert!(longer.validate(1).is_ok());
    }

    #[test]
    fn test_empty_chain_rejected() {
        assert!(Chain::from_blocks(vec![]).is_err());
    }

    #[test]
    fn test_foreign_genesis_rejected() {
        let mut blocks = extend(&Chain::genesis(), 1).to_blocks();
        blocks[0].timestamp = 42.0;
        blocks[0].hash = blocks[0].compute_hash();

        let chain = Chain::from_blocks(blocks).unwrap();
        assert!(matches!(chain.validate(1), Err(BlockchainError::InvalidChain(_))));
    }

    #[test]
    fn test_index_gap_rejected() {
        let genesis = Chain::genesis();
        let mut block = Block::new(2, genesis.tip().hash.clone(), now(), vec![]);
        block.mine(1, &CancelToken::new());
        let chain = genesis.with_block(block);

        let err = chain.validate(1).unwrap_err();
        assert!(err.to_string().contains("expected index 1"));
    }

    #[test]
    fn test_broken_link_rejected() {
        let chain = extend(&extend(&Chain::genesis(), 1), 1);
        let mut blocks = chain.to_blocks();
        blocks[1].nonce += 1;

        let tampered = Chain::from_blocks(blocks).unwrap();
        assert!(tampered.validate(1).is_err());
    }
}
