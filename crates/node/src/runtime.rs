// node/src/runtime.rs
use crate::{wallet, NodeConfig};
use blockchain_core::{Ledger, LedgerConfig, SubmitOutcome, Transaction};
use blockchain_crypto::{KeyPair, Secp256k1Signer};
use networking::{NetworkConfig, Node, PeerAddress, Transport, WireMessage};
use std::sync::Arc;
use std::time::Duration;

/// A running node: the network overlay plus the local wallet
pub struct NodeRuntime {
    config: NodeConfig,
    wallet: KeyPair,
    node: Arc<Node>,
}

impl NodeRuntime {
    /// Bind the listener, load the wallet and join through the configured
    /// bootstrap peer, if any
    pub async fn start(config: NodeConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let wallet = wallet::load_or_generate(config.wallet.key_file.as_deref())?;

        tracing::info!(
            "Starting node (difficulty {}, mining threshold {})",
            config.ledger.difficulty,
            config.ledger.mining_threshold
        );
        let node = Node::spawn(
            config.network.clone(),
            config.ledger.clone(),
            Arc::new(Secp256k1Signer),
        )
        .await?;

        if let Some(bootstrap) = config.network.bootstrap_peer()? {
            if let Err(e) = node.join(&bootstrap).await {
                node.stop().await;
                return Err(e.into());
            }
        }

        tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        tracing::info!("  Node is running");
        tracing::info!("  Listening: {}", node.address());
        tracing::info!("  Peers:     {}", node.directory().len());
        tracing::info!("  Chain:     {} blocks", node.ledger().chain().len());
        tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        Ok(Self {
            config,
            wallet,
            node,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn wallet(&self) -> &KeyPair {
        &self.wallet
    }

    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        self.node.ledger()
    }

    /// Build, sign and submit a transfer from this node's wallet
    pub async fn create_transaction(
        &self,
        recipient: &str,
        amount: f64,
    ) -> anyhow::Result<SubmitOutcome> {
        let mut tx = Transaction::new(self.wallet.public_key().to_pem(), recipient, amount);
        tx.sign(&self.wallet)?;
        let outcome = self.node.submit_transaction(tx).await?;
        tracing::info!("Transaction of {} to {} {:?}", amount, short(recipient), outcome);
        Ok(outcome)
    }

    /// Human-readable chain and mempool dump
    pub fn chain_report(&self) -> String {
        let ledger = self.ledger();
        let metrics = ledger.pool_metrics();
        let mut report = format!(
            "{}\nPool: {} pending, {} admitted, {} settled\n",
            ledger, metrics.pending_count, metrics.total_added, metrics.total_removed
        );
        for tx in ledger.mempool() {
            report.push_str(&format!("Pending:\n{}", tx));
        }
        for block in ledger.chain().blocks() {
            report.push_str(&format!("{}\n", block));
        }
        report
    }

    /// Announce departure and stop serving
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down node...");
        self.node.leave().await;
        tracing::info!("Node shutdown complete");
    }
}

/// Deliver one signed transaction to `peer` without running a node
pub async fn send_transaction(
    network: &NetworkConfig,
    peer: &PeerAddress,
    wallet: &KeyPair,
    recipient: &str,
    amount: f64,
) -> anyhow::Result<Transaction> {
    let mut tx = Transaction::new(wallet.public_key().to_pem(), recipient, amount);
    tx.sign(wallet)?;

    let transport = network.transport();
    transport
        .send(peer, &WireMessage::NewTransaction { transaction: tx.clone() })
        .await?;
    tracing::info!("✓ Sent transaction of {} to {}", amount, peer);
    Ok(tx)
}

/// Three in-process nodes: two trade transactions until both mine, a third
/// joins late and syncs the longest chain
pub async fn run_demo(difficulty: usize, base_port: u16) -> anyhow::Result<()> {
    let demo_config = |ip: &str, offset: u16, bootstrap: Option<String>| NodeConfig {
        network: NetworkConfig {
            listen_addr: ip.to_string(),
            port: if base_port == 0 { 0 } else { base_port + offset },
            bootstrap,
            ..Default::default()
        },
        ledger: LedgerConfig {
            difficulty,
            ..Default::default()
        },
        ..Default::default()
    };
    let pause = |ms| tokio::time::sleep(Duration::from_millis(ms));

    let peer1 = NodeRuntime::start(demo_config("127.0.0.1", 0, None)).await?;
    let bootstrap = Some(peer1.node().address().to_string());
    pause(500).await;

    let peer2 = NodeRuntime::start(demo_config("127.0.0.2", 1, bootstrap.clone())).await?;
    pause(500).await;

    for _ in 0..3 {
        peer1.create_transaction("DUMMY_RECIPIENT", 15.0).await?;
        pause(100).await;
    }
    pause(1000).await;
    peer2.create_transaction("DUMMY_RECIPIENT", 15.0).await?;
    pause(1000).await;
    peer2.create_transaction("DUMMY_RECIPIENT", 15.0).await?;

    // both mempools are at the threshold now; one block wins
    peer2.create_transaction("DUMMY_RECIPIENT", 100.0).await?;
    let mined = wait_for_length(peer1.ledger(), 2, Duration::from_secs(60)).await;
    anyhow::ensure!(mined, "peer1 never reached 2 blocks");

    let peer3 = NodeRuntime::start(demo_config("127.0.0.3", 2, bootstrap)).await?;
    pause(500).await;
    for _ in 0..4 {
        pause(100).await;
        peer3.create_transaction("DUMMY_RECIPIENT", 15.0).await?;
    }
    let synced = wait_for_length(peer3.ledger(), 3, Duration::from_secs(60)).await;
    anyhow::ensure!(synced, "peer3 never reached 3 blocks");

    for (name, peer) in [("peer1", &peer1), ("peer2", &peer2), ("peer3", &peer3)] {
        println!("===== {} ({}) =====", name, peer.node().address());
        println!("{}", peer.chain_report());
    }

    peer1.shutdown().await;
    pause(500).await;
    peer2.shutdown().await;
    pause(500).await;
    peer3.shutdown().await;
    Ok(())
}

async fn wait_for_length(ledger: &Arc<Ledger>, len: usize, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if ledger.chain().len() >= len && !ledger.is_mining() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    tracing::warn!("Chain did not reach {} blocks within {:?}", len, limit);
    false
}

fn short(key: &str) -> &str {
    let key = key.trim();
    match key.char_indices().nth(24) {
        Some((idx, _)) => &key[..idx],
        None => key,
    }
}
