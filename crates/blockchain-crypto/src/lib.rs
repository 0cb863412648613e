// blockchain-crypto/src/lib.rs

//! Cryptographic primitives for the proof-of-work ledger
//!
//! This crate provides:
//! - SHA-256 hashing with hex digests
//! - The `Signer` capability (ECDSA over secp256k1, SHA-256 digest)
//! - Key pair generation and PEM armour for public keys

pub mod hash;
pub mod keypair;
pub mod signature;

pub use hash::{sha256_hex, Hash, Hashable, HASH_HEX_LEN};
pub use keypair::{KeyPair, PublicKey, SecretKey};
pub use signature::{Secp256k1Signer, Signature, Signer};

/// Result type for cryptographic operations
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur during cryptographic operations
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid secret key")]
    InvalidSecretKey,

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}
