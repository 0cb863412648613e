// blockchain-crypto/src/signature.rs

use crate::{hash::Hashable, CryptoError, CryptoResult, PublicKey, SecretKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// DER-encoded ECDSA signature, carried on the wire as hex
#[derive(Clone, PartialEq, Eq)]
pub struct Signature {
    bytes: Vec<u8>,
}

impl Signature {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| CryptoError::DeserializationError(e.to_string()))?;
        Ok(Self::new(bytes))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Signature({}...)",
            hex::encode(&self.bytes[..8.min(self.bytes.len())])
        )
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Signature::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Signature capability used by the ledger.
///
/// `public_key` is the sender key exactly as carried in a transaction
/// (PEM bytes); implementations decide how to interpret it.
pub trait Signer: Send + Sync {
    fn sign(&self, secret_key: &SecretKey, message: &[u8]) -> CryptoResult<Signature>;

    fn verify(&self, public_key: &[u8], message: &[u8], signature: &Signature) -> bool;
}

/// ECDSA over secp256k1 with a SHA-256 message digest
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Signer;

impl Secp256k1Signer {
    fn digest(message: &[u8]) -> CryptoResult<secp256k1::Message> {
        let msg_hash = message.hash();
        secp256k1::Message::from_digest_slice(msg_hash.as_bytes())
            .map_err(|_| CryptoError::InvalidSignature)
    }

    fn try_verify(public_key: &[u8], message: &[u8], signature: &Signature) -> CryptoResult<bool> {
        use secp256k1::{ecdsa::Signature as Secp256k1Sig, Secp256k1};

        let pem = std::str::from_utf8(public_key)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        let pk = PublicKey::from_pem(pem)?.to_secp()?;

        let mut sig = Secp256k1Sig::from_der(signature.as_bytes())
            .map_err(|_| CryptoError::InvalidSignature)?;
        // libsecp256k1 only accepts low-S; other ECDSA stacks may emit high-S
        sig.normalize_s();

        let secp = Secp256k1::verification_only();
        let msg = Self::digest(message)?;
        Ok(secp.verify_ecdsa(&msg, &sig, &pk).is_ok())
    }
}

impl Signer for Secp256k1Signer {
    fn sign(&self, secret_key: &SecretKey, message: &[u8]) -> CryptoResult<Signature> {
        let secp = secp256k1::Secp256k1::signing_only();
        let msg = Self::digest(message)?;
        let signature = secp.sign_ecdsa(&msg, &secret_key.to_secp()?);
        Ok(Signature::new(signature.serialize_der().to_vec()))
    }

    fn verify(&self, public_key: &[u8], message: &[u8], signature: &Signature) -> bool {
        Self::try_verify(public_key, message, signature).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KeyPair;

    #[test]
    fn test_signature_secp256k1() {
        let keypair = KeyPair::generate().unwrap();
        let pem = keypair.public_key().to_pem();
        let message = b"Test message";

        let signature = keypair.sign(message).unwrap();
        assert!(Secp256k1Signer.verify(pem.as_bytes(), message, &signature));

        let wrong_message = b"Wrong message";
        assert!(!Secp256k1Signer.verify(pem.as_bytes(), wrong_message, &signature));
    }

    #[test]
    fn test_foreign_key_fails() {
        let signer = KeyPair::generate().unwrap();
        let other = KeyPair::generate().unwrap();
        let signature = signer.sign(b"payload").unwrap();

        let pem = other.public_key().to_pem();
        assert!(!Secp256k1Signer.verify(pem.as_bytes(), b"payload", &signature));
    }

    #[test]
    fn test_malformed_inputs_do_not_verify() {
        let keypair = KeyPair::generate().unwrap();
        let signature = keypair.sign(b"payload").unwrap();

        assert!(!Secp256k1Signer.verify(b"not a key", b"payload", &signature));
        let pem = keypair.public_key().to_pem();
        assert!(!Secp256k1Signer.verify(pem.as_bytes(), b"payload", &Signature::new(vec![1, 2, 3])));
    }

    #[test]
    fn test_signature_serde_hex() {
        let keypair = KeyPair::generate().unwrap();
        let sig = keypair.sign(b"Test").unwrap();

        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(json, format!("\"{}\"", sig.to_hex()));
        let parsed: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(sig, parsed);
    }
}
