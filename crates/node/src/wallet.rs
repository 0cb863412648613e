// node/src/wallet.rs
use blockchain_crypto::{KeyPair, SecretKey};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// On-disk key pair: PEM public key and hex secret key
#[derive(Debug, Serialize, Deserialize)]
pub struct WalletFile {
    pub public_key: String,
    pub secret_key: String,
}

impl WalletFile {
    pub fn from_keypair(keypair: &KeyPair) -> Self {
        Self {
            public_key: keypair.public_key().to_pem(),
            secret_key: keypair.secret_key().to_hex(),
        }
    }

    pub fn to_keypair(&self) -> anyhow::Result<KeyPair> {
        let secret = SecretKey::from_hex(&self.secret_key)?;
        let keypair = KeyPair::from_secret(secret)?;
        if keypair.public_key().to_pem() != self.public_key {
            anyhow::bail!("public key does not match secret key");
        }
        Ok(keypair)
    }
}

pub fn load_keypair(path: impl AsRef<Path>) -> anyhow::Result<KeyPair> {
    let contents = std::fs::read_to_string(path)?;
    let file: WalletFile = serde_json::from_str(&contents)?;
    file.to_keypair()
}

pub fn save_keypair(keypair: &KeyPair, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let contents = serde_json::to_string_pretty(&WalletFile::from_keypair(keypair))?;
    std::fs::write(path, contents)?;
    Ok(())
}

/// Load the configured key file, or generate a fresh key pair.
/// A configured path that does not exist yet receives the new pair.
pub fn load_or_generate(key_file: Option<&str>) -> anyhow::Result<KeyPair> {
    match key_file {
        Some(path) if Path::new(path).exists() => {
            let keypair = load_keypair(path)?;
            tracing::info!("✓ Loaded wallet from {}", path);
            Ok(keypair)
        }
        Some(path) => {
            let keypair = KeyPair::generate()?;
            save_keypair(&keypair, path)?;
            tracing::info!("✓ Generated wallet and saved it to {}", path);
            Ok(keypair)
        }
        None => {
            let keypair = KeyPair::generate()?;
            tracing::info!("✓ Generated ephemeral wallet");
            Ok(keypair)
        }
    }
}
