// blockchain-core/src/transaction.rs

use crate::{types::*, BlockchainError, BlockchainResult};
use blockchain_crypto::{KeyPair, Signature, Signer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Signed value transfer between two public keys.
///
/// Equality covers sender, recipient, amount and timestamp only; the
/// signature is excluded so mempool membership does not depend on re-signing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender's public key, PEM-encoded
    pub sender_public_key: String,
    /// Recipient's public key (opaque identifier)
    pub recipient_public_key: String,
    pub amount: Amount,
    /// DER signature over `signing_payload()`; `None` until signed
    #[serde(default)]
    pub signature: Option<Signature>,
    pub timestamp: Timestamp,
}

impl Transaction {
    /// Create a new unsigned transaction stamped with the current time
    pub fn new(
        sender_public_key: impl Into<String>,
        recipient_public_key: impl Into<String>,
        amount: Amount,
    ) -> Self {
        Self::with_timestamp(sender_public_key, recipient_public_key, amount, now())
    }

    pub fn with_timestamp(
        sender_public_key: impl Into<String>,
        recipient_public_key: impl Into<String>,
        amount: Amount,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            sender_public_key: sender_public_key.into(),
            recipient_public_key: recipient_public_key.into(),
            amount,
            signature: None,
            timestamp,
        }
    }

    /// Canonical bytes covered by the signature
    pub fn signing_payload(&self) -> String {
        format!(
            "{}{}{}{}",
            self.sender_public_key, self.recipient_public_key, self.amount, self.timestamp
        )
    }

    /// Bytes contributed to a block hash; includes the signature so that
    /// swapping signatures inside a mined block is detected.
    pub fn hash_payload(&self) -> String {
        let signature = self
            .signature
            .as_ref()
            .map(Signature::to_hex)
            .unwrap_or_default();
        format!("{}{}", self.signing_payload(), signature)
    }

    /// Sign the transaction with the sender's wallet
    pub fn sign(&mut self, keypair: &KeyPair) -> BlockchainResult<()> {
        if keypair.public_key().to_pem() != self.sender_public_key {
            return Err(BlockchainError::InvalidTransaction(
                "cannot sign transaction for other wallets".into(),
            ));
        }
        let signature = keypair.sign(self.signing_payload().as_bytes())?;
        self.signature = Some(signature);
        Ok(())
    }

    /// Check amount and signature; the ledger admits nothing that fails here
    pub fn verify(&self, signer: &dyn Signer) -> BlockchainResult<()> {
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(BlockchainError::InvalidTransaction(
                "amount can not be negative".into(),
            ));
        }

        let signature = self.signature.as_ref().ok_or_else(|| {
            BlockchainError::InvalidTransaction("transaction is not signed".into())
        })?;

        let payload = self.signing_payload();
        if !signer.verify(self.sender_public_key.as_bytes(), payload.as_bytes(), signature) {
            return Err(BlockchainError::InvalidTransaction(
                "signature verification failed".into(),
            ));
        }
        Ok(())
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.sender_public_key == other.sender_public_key
            && self.recipient_public_key == other.recipient_public_key
            && self.amount == other.amount
            && self.timestamp == other.timestamp
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Sender: {}", self.sender_public_key.trim())?;
        writeln!(f, "  Recipient: {}", self.recipient_public_key)?;
        writeln!(f, "  Amount: {}", self.amount)?;
        writeln!(f, "  Timestamp: {}", self.timestamp)?;
        match &self.signature {
            Some(sig) => writeln!(f, "  Signature: {}", sig),
            None => writeln!(f, "  Signature: Unsigned"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockchain_crypto::Secp256k1Signer;

    fn signed(keypair: &KeyPair, amount: Amount) -> Transaction {
        let mut tx = Transaction::new(keypair.public_key().to_pem(), "DUMMY_RECIPIENT", amount);
        tx.sign(keypair).unwrap();
        tx
    }

    #[test]
    fn test_transaction_signing() {
        let keypair = KeyPair::generate().unwrap();
        let tx = signed(&keypair, 15.0);

        assert!(tx.is_signed());
        assert!(tx.verify(&Secp256k1Signer).is_ok());
    }

    #[test]
    fn test_unsigned_rejected() {
        let keypair = KeyPair::generate().unwrap();
        let tx = Transaction::new(keypair.public_key().to_pem(), "bob", 1.0);

        let err = tx.verify(&Secp256k1Signer).unwrap_err();
        assert!(err.to_string().contains("not signed"));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let keypair = KeyPair::generate().unwrap();
        let tx = signed(&keypair, -5.0);

        let err = tx.verify(&Secp256k1Signer).unwrap_err();
        assert!(matches!(err, BlockchainError::InvalidTransaction(_)));
    }

    #[test]
    fn test_tampering_breaks_signature() {
        let keypair = KeyPair::generate().unwrap();
        let mut tx = signed(&keypair, 15.0);

        tx.amount = 1500.0;
        assert!(tx.verify(&Secp256k1Signer).is_err());
    }

    #[test]
    fn test_cannot_sign_for_other_wallet() {
        let owner = KeyPair::generate().unwrap();
        let intruder = KeyPair::generate().unwrap();
        let mut tx = Transaction::new(owner.public_key().to_pem(), "bob", 1.0);

        assert!(tx.sign(&intruder).is_err());
        assert!(tx.signature.is_none());
    }

    #[test]
    fn test_equality_ignores_signature() {
        let keypair = KeyPair::generate().unwrap();
        let tx = signed(&keypair, 3.0);
        let mut resigned = tx.clone();
        resigned.signature = None;
        assert_eq!(tx, resigned);

        let mut later = tx.clone();
        later.timestamp += 1.0;
        assert_ne!(tx, later);
    }

    #[test]
    fn test_wire_roundtrip() {
        let keypair = KeyPair::generate().unwrap();
        let tx = signed(&keypair, 12.5);

        let json = serde_json::to_string(&tx).unwrap();
        let back: Transaction = serde_json::from_str(&json).unwrap();

        assert_eq!(back, tx);
        assert_eq!(back.signature, tx.signature);
        assert_eq!(back.hash_payload(), tx.hash_payload());
        assert!(back.verify(&Secp256k1Signer).is_ok());
    }

    #[test]
    fn test_wire_null_signature() {
        let json = r#"{"sender_public_key":"a","recipient_public_key":"b","amount":10,"signature":null,"timestamp":15.0}"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert!(tx.signature.is_none());
        assert_eq!(tx.amount, 10.0);
        assert_eq!(tx.signing_payload(), "ab1015");
    }
}
