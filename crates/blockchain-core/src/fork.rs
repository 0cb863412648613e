// blockchain-core/src/fork.rs

use serde::{Deserialize, Serialize};

/// Fork choice rule
///
/// Only raw length is compared. A long chain of low-difficulty blocks can
/// therefore displace a shorter chain carrying more work; cumulative-work
/// selection is not implemented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForkChoice {
    /// Longest valid chain wins, ties keep the current chain
    #[default]
    LongestChain,
}

impl ForkChoice {
    /// Whether a candidate of `candidate_len` blocks should replace the
    /// current chain of `current_len` blocks
    pub fn prefers(&self, current_len: usize, candidate_len: usize) -> bool {
        match self {
            ForkChoice::LongestChain => candidate_len > current_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_chain() {
        let rule = ForkChoice::LongestChain;
        assert!(rule.prefers(1, 2));
        assert!(!rule.prefers(2, 2));
        assert!(!rule.prefers(3, 2));
    }
}
