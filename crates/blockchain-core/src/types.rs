// blockchain-core/src/types.rs

/// Position of a block in the chain
pub type BlockIndex = u64;

/// Proof-of-work counter
pub type Nonce = u64;

/// Unix epoch seconds with sub-second precision
pub type Timestamp = f64;

/// Transferred value. Signed so that negative wire values can be rejected.
pub type Amount = f64;

/// Number of leading hex zeros a block hash must carry
pub type Difficulty = usize;

/// `previous_hash` of the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Mempool size at which a mining attempt is started
pub const DEFAULT_MINING_THRESHOLD: usize = 5;

/// Default proof-of-work difficulty
pub const DEFAULT_DIFFICULTY: Difficulty = 4;

/// Current wall-clock time as a `Timestamp`
pub fn now() -> Timestamp {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
