// blockchain-crypto/src/hash.rs

use sha2::{Digest, Sha256};
use std::fmt;

/// Hash output size in bytes
pub const HASH_SIZE: usize = 32;

/// Length of a hash rendered as lowercase hex
pub const HASH_HEX_LEN: usize = HASH_SIZE * 2;

/// A 32-byte SHA-256 digest
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash([u8; HASH_SIZE]);

impl Hash {
    /// Create a new hash from bytes
    pub fn new(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the hash as a byte slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to lowercase hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({}...{})",
               hex::encode(&self.0[..4]),
               hex::encode(&self.0[28..]))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Trait for types that can be hashed
pub trait Hashable {
    fn hash(&self) -> Hash;
}

impl Hashable for [u8] {
    fn hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self);
        Hash::new(hasher.finalize().into())
    }
}

/// SHA-256 of `data` as a 64-character lowercase hex string
pub fn sha256_hex(data: &[u8]) -> String {
    data.hash().to_hex()
}
