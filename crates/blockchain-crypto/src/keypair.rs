// blockchain-crypto/src/keypair.rs

use crate::{CryptoError, CryptoResult, Secp256k1Signer, Signature, Signer};
use base64::Engine as _;
use std::fmt;

const PEM_HEADER: &str = "-----BEGIN PUBLIC KEY-----";
const PEM_FOOTER: &str = "-----END PUBLIC KEY-----";
const PEM_LINE_WIDTH: usize = 64;

/// DER prefix of a SubjectPublicKeyInfo holding an uncompressed secp256k1 point
/// (id-ecPublicKey, secp256k1, BIT STRING of 66 bytes).
const SPKI_SECP256K1_PREFIX: [u8; 23] = [
    0x30, 0x56, 0x30, 0x10, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x05,
    0x2b, 0x81, 0x04, 0x00, 0x0a, 0x03, 0x42, 0x00,
];

/// secp256k1 public key (uncompressed SEC1 encoding)
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    bytes: Vec<u8>,
}

impl PublicKey {
    /// Wrap raw SEC1 bytes, rejecting anything that is not a curve point
    pub fn from_sec1(bytes: &[u8]) -> CryptoResult<Self> {
        let point = secp256k1::PublicKey::from_slice(bytes)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Ok(Self {
            bytes: point.serialize_uncompressed().to_vec(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// PEM armour (SubjectPublicKeyInfo), the form carried in transactions
    pub fn to_pem(&self) -> String {
        let mut der = Vec::with_capacity(SPKI_SECP256K1_PREFIX.len() + self.bytes.len());
        der.extend_from_slice(&SPKI_SECP256K1_PREFIX);
        der.extend_from_slice(&self.bytes);

        let body = base64::engine::general_purpose::STANDARD.encode(der);
        let mut pem = String::from(PEM_HEADER);
        pem.push('\n');
        for line in body.as_bytes().chunks(PEM_LINE_WIDTH) {
            // base64 output is ASCII, so every chunk is valid UTF-8
            pem.push_str(&String::from_utf8_lossy(line));
            pem.push('\n');
        }
        pem.push_str(PEM_FOOTER);
        pem.push('\n');
        pem
    }

    /// Parse a PEM-armoured secp256k1 SubjectPublicKeyInfo
    pub fn from_pem(pem: &str) -> CryptoResult<Self> {
        let trimmed = pem.trim();
        let body = trimmed
            .strip_prefix(PEM_HEADER)
            .and_then(|rest| rest.strip_suffix(PEM_FOOTER))
            .ok_or_else(|| CryptoError::InvalidPublicKey("missing PEM armour".into()))?;

        let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
        let der = base64::engine::general_purpose::STANDARD
            .decode(compact)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;

        let point = der
            .strip_prefix(&SPKI_SECP256K1_PREFIX[..])
            .ok_or_else(|| CryptoError::InvalidPublicKey("not a secp256k1 key".into()))?;
        Self::from_sec1(point)
    }

    pub(crate) fn to_secp(&self) -> CryptoResult<secp256k1::PublicKey> {
        secp256k1::PublicKey::from_slice(&self.bytes)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PublicKey({}...)",
            hex::encode(&self.bytes[..8.min(self.bytes.len())])
        )
    }
}

/// Secret key wrapper (kept private)
pub struct SecretKey {
    bytes: Vec<u8>,
}

impl SecretKey {
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        secp256k1::SecretKey::from_slice(bytes).map_err(|_| CryptoError::InvalidSecretKey)?;
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| CryptoError::DeserializationError(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub(crate) fn to_secp(&self) -> CryptoResult<secp256k1::SecretKey> {
        secp256k1::SecretKey::from_slice(&self.bytes).map_err(|_| CryptoError::InvalidSecretKey)
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.bytes.iter_mut().for_each(|b| *b = 0);
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey([REDACTED])")
    }
}

/// Wallet key pair
pub struct KeyPair {
    public_key: PublicKey,
    secret_key: SecretKey,
}

impl KeyPair {
    /// Generate a new random keypair
    pub fn generate() -> CryptoResult<Self> {
        use rand::rngs::OsRng;
        use secp256k1::{PublicKey as Secp256k1Pk, SecretKey as Secp256k1Sk, Secp256k1};

        let secp = Secp256k1::new();
        let mut rng = OsRng;

        let secret_key = Secp256k1Sk::new(&mut rng);
        let public_key = Secp256k1Pk::from_secret_key(&secp, &secret_key);

        Ok(Self {
            public_key: PublicKey::from_sec1(&public_key.serialize_uncompressed())?,
            secret_key: SecretKey::from_bytes(&secret_key.secret_bytes())?,
        })
    }

    /// Rebuild a keypair from its secret key, deriving the public half
    pub fn from_secret(secret_key: SecretKey) -> CryptoResult<Self> {
        let secp = secp256k1::Secp256k1::signing_only();
        let public = secp256k1::PublicKey::from_secret_key(&secp, &secret_key.to_secp()?);
        Ok(Self {
            public_key: PublicKey::from_sec1(&public.serialize_uncompressed())?,
            secret_key,
        })
    }

    /// Create keypair from existing keys, checking that they belong together
    pub fn from_keys(public_key: PublicKey, secret_key: SecretKey) -> CryptoResult<Self> {
        let derived = Self::from_secret(secret_key)?;
        if derived.public_key != public_key {
            return Err(CryptoError::InvalidSecretKey);
        }
        Ok(derived)
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> CryptoResult<Signature> {
        Secp256k1Signer.sign(&self.secret_key, message)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let kp1 = KeyPair::generate().unwrap();
        let kp2 = KeyPair::generate().unwrap();
        assert_ne!(kp1.public_key(), kp2.public_key());
    }

    #[test]
    fn test_pem_roundtrip() {
        let keypair = KeyPair::generate().unwrap();
        let pem = keypair.public_key().to_pem();

        assert!(pem.starts_with(PEM_HEADER));
        assert!(pem.trim_end().ends_with(PEM_FOOTER));
        assert_eq!(&PublicKey::from_pem(&pem).unwrap(), keypair.public_key());
    }

    #[test]
    fn test_pem_rejects_garbage() {
        assert!(PublicKey::from_pem("DUMMY_RECIPIENT").is_err());
        let broken = format!("{}\nAAAA\n{}", PEM_HEADER, PEM_FOOTER);
        assert!(PublicKey::from_pem(&broken).is_err());
    }

    #[test]
    fn test_from_secret_restores_public_key() {
        let keypair = KeyPair::generate().unwrap();
        let secret = SecretKey::from_hex(&keypair.secret_key().to_hex()).unwrap();
        let restored = KeyPair::from_secret(secret).unwrap();
        assert_eq!(restored.public_key(), keypair.public_key());
    }

    #[test]
    fn test_from_keys_rejects_mismatch() {
        let a = KeyPair::generate().unwrap();
        let b = KeyPair::generate().unwrap();
        let secret = SecretKey::from_hex(&a.secret_key().to_hex()).unwrap();
        assert!(KeyPair::from_keys(b.public_key().clone(), secret).is_err());
    }
}
