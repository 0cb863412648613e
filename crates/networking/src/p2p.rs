// networking/src/p2p.rs

use crate::{
    gossip::GossipService,
    peer::{PeerAddress, PeerDirectory},
    protocol::WireMessage,
    transport::{self, TcpTransport, Transport},
    NetworkError, NetworkResult,
};
use blockchain_core::{
    Block, Chain, ChainListener, Ledger, LedgerConfig, ReplaceOutcome, SubmitOutcome, Transaction,
};
use blockchain_crypto::Signer;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to listen on; also what peers are told to dial
    pub listen_addr: String,
    /// 0 picks an ephemeral port
    pub port: u16,
    /// Peer to join through, as `host:port`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<String>,
    pub connect_timeout_ms: u64,
    pub io_timeout_ms: u64,
    pub max_message_bytes: usize,
    /// Inbound connections served concurrently
    pub max_inbound_connections: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1".to_string(),
            port: 5000,
            bootstrap: None,
            connect_timeout_ms: transport::DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
            io_timeout_ms: transport::DEFAULT_IO_TIMEOUT.as_millis() as u64,
            max_message_bytes: transport::DEFAULT_MAX_MESSAGE_BYTES,
            max_inbound_connections: 64,
        }
    }
}

impl NetworkConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn bootstrap_peer(&self) -> NetworkResult<Option<PeerAddress>> {
        self.bootstrap
            .as_deref()
            .map(|s| s.parse::<PeerAddress>())
            .transpose()
    }

    pub fn transport(&self) -> TcpTransport {
        TcpTransport::new(self.connect_timeout(), self.io_timeout(), self.max_message_bytes)
    }
}

/// A ledger attached to the gossip overlay.
///
/// Serves one request per inbound connection, relays newly accepted
/// transactions and chains, and broadcasts every locally mined chain.
pub struct Node {
    address: PeerAddress,
    config: NetworkConfig,
    ledger: Arc<Ledger>,
    directory: Arc<PeerDirectory>,
    transport: Arc<dyn Transport>,
    gossip: GossipService,
    connection_limit: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Node {
    /// Bind the listener and start serving over TCP
    pub async fn spawn(
        config: NetworkConfig,
        ledger_config: LedgerConfig,
        signer: Arc<dyn Signer>,
    ) -> NetworkResult<Arc<Self>> {
        let transport = Arc::new(config.transport());
        Self::spawn_with_transport(config, ledger_config, signer, transport).await
    }

    pub async fn spawn_with_transport(
        config: NetworkConfig,
        ledger_config: LedgerConfig,
        signer: Arc<dyn Signer>,
        transport: Arc<dyn Transport>,
    ) -> NetworkResult<Arc<Self>> {
        if config.max_inbound_connections == 0 {
            return Err(NetworkError::ConnectionError(
                "max_inbound_connections must be at least 1".into(),
            ));
        }

        let listener = TcpListener::bind((config.listen_addr.as_str(), config.port))
            .await
            .map_err(|e| {
                NetworkError::ConnectionError(format!(
                    "bind {}:{}: {}",
                    config.listen_addr, config.port, e
                ))
            })?;
        let local = listener.local_addr()?;
        let address = PeerAddress::new(config.listen_addr.clone(), local.port());

        let (mined_tx, mined_rx) = mpsc::unbounded_channel::<Arc<Chain>>();
        let on_mined: ChainListener = Arc::new(move |chain: Arc<Chain>| {
            // receiver only goes away during shutdown
            let _ = mined_tx.send(chain);
        });
        let ledger = Ledger::new(ledger_config, signer, Some(on_mined))?;

        let directory = Arc::new(PeerDirectory::new(address.clone()));
        let gossip = GossipService::new(Arc::clone(&transport), Arc::clone(&directory));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let node = Arc::new(Self {
            address,
            connection_limit: Arc::new(Semaphore::new(config.max_inbound_connections)),
            config,
            ledger,
            directory,
            transport,
            gossip,
            shutdown,
            tasks: Mutex::new(Vec::new()),
        });

        let accept = tokio::spawn(Arc::clone(&node).accept_loop(listener, shutdown_rx.clone()));
        let relay = tokio::spawn(Arc::clone(&node).relay_mined(mined_rx, shutdown_rx));
        node.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend([accept, relay]);

        info!("✓ Node listening on {}", node.address);
        Ok(node)
    }

    pub fn address(&self) -> &PeerAddress {
        &self.address
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn directory(&self) -> &Arc<PeerDirectory> {
        &self.directory
    }

    pub fn is_running(&self) -> bool {
        !*self.shutdown.borrow()
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let permit = tokio::select! {
                _ = shutdown.changed() => break,
                permit = Arc::clone(&self.connection_limit).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let (stream, remote) = tokio::select! {
                _ = shutdown.changed() => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("Accept failed on {}: {}", self.address, e);
                        continue;
                    }
                },
            };

            let node = Arc::clone(&self);
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) = node.serve_connection(stream).await {
                    debug!("Dropped connection from {}: {}", remote, e);
                }
            });
        }

        info!("Stopped accepting connections on {}", self.address);
    }

    async fn relay_mined(
        self: Arc<Self>,
        mut mined: mpsc::UnboundedReceiver<Arc<Chain>>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                chain = mined.recv() => match chain {
                    Some(chain) => {
                        self.gossip.broadcast_chain(&chain).await;
                    }
                    None => break,
                },
            }
        }
    }

    async fn serve_connection(self: Arc<Self>, mut stream: TcpStream) -> NetworkResult<()> {
        let io_timeout = self.config.io_timeout();
        let max = self.config.max_message_bytes;

        let message = timeout(io_timeout, transport::read_message(&mut stream, max))
            .await
            .map_err(|_| NetworkError::Timeout("reading request".into()))??;
        let kind = message.kind();
        let wants_reply = message.expects_reply();
        debug!("Received {}", kind);

        let reply = self.handle_message(message).await?;
        if !wants_reply {
            return Ok(());
        }
        let reply = reply
            .ok_or_else(|| NetworkError::ProtocolError(format!("no reply produced for {}", kind)))?;
        timeout(io_timeout, transport::write_message(&mut stream, &reply, max))
            .await
            .map_err(|_| NetworkError::Timeout("writing reply".into()))??;
        Ok(())
    }

    /// Apply one inbound message; returns the reply for request kinds
    pub async fn handle_message(self: &Arc<Self>, message: WireMessage) -> NetworkResult<Option<WireMessage>> {
        match message {
            WireMessage::PeersRequest => Ok(Some(WireMessage::PeersReply {
                peers: self.directory.as_map(),
            })),

            WireMessage::NewPeer { address, port } => {
                let peer = PeerAddress::new(address, port);
                if self.directory.add(&peer) {
                    info!("Peer {} joined", peer);
                }
                Ok(Some(WireMessage::ChainSnapshot {
                    blockchain: self.ledger.chain().to_blocks(),
                }))
            }

            WireMessage::Leave { address, port } => {
                let peer = PeerAddress::new(address, port);
                if self.directory.remove(&peer) {
                    info!("Peer {} left", peer);
                }
                Ok(None)
            }

            WireMessage::NewTransaction { transaction } => {
                match self.ledger.submit_transaction(transaction.clone()) {
                    Ok(SubmitOutcome::Accepted) => {
                        self.relay(WireMessage::NewTransaction { transaction });
                    }
                    Ok(SubmitOutcome::Duplicate) => debug!("Ignoring known transaction"),
                    Err(e) => warn!("Rejected gossiped transaction: {}", e),
                }
                Ok(None)
            }

            WireMessage::ChainSnapshot { blockchain } => {
                match self.adopt_chain(blockchain).await? {
                    ReplaceOutcome::Replaced { .. } => {
                        self.relay(WireMessage::ChainSnapshot {
                            blockchain: self.ledger.chain().to_blocks(),
                        });
                    }
                    ReplaceOutcome::Kept => debug!("Kept local chain"),
                }
                Ok(None)
            }

            WireMessage::PeersReply { .. } => Err(NetworkError::ProtocolError(
                "unsolicited PEERS_REPLY".into(),
            )),
        }
    }

    /// Run fork choice off the async workers; an invalid chain counts as kept
    async fn adopt_chain(&self, blocks: Vec<Block>) -> NetworkResult<ReplaceOutcome> {
        let ledger = Arc::clone(&self.ledger);
        let result = tokio::task::spawn_blocking(move || ledger.compare_and_replace(blocks))
            .await
            .map_err(|e| NetworkError::TaskFailed(e.to_string()))?;

        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!("Discarded candidate chain: {}", e);
                Ok(ReplaceOutcome::Kept)
            }
        }
    }

    fn relay(self: &Arc<Self>, message: WireMessage) {
        let node = Arc::clone(self);
        tokio::spawn(async move {
            node.gossip.broadcast(&message).await;
        });
    }

    /// Join the overlay through `bootstrap` and sync to the longest chain
    /// offered by any reachable peer
    pub async fn join(&self, bootstrap: &PeerAddress) -> NetworkResult<()> {
        self.directory.add(bootstrap);

        match self.transport.request(bootstrap, &WireMessage::PeersRequest).await? {
            WireMessage::PeersReply { peers } => {
                self.directory.merge(peers);
            }
            other => {
                return Err(NetworkError::ProtocolError(format!(
                    "expected PEERS_REPLY, got {}",
                    other.kind()
                )))
            }
        }

        let announce = WireMessage::NewPeer {
            address: self.address.address.clone(),
            port: self.address.port,
        };
        for peer in self.directory.snapshot() {
            match self.transport.request(&peer, &announce).await {
                Ok(WireMessage::ChainSnapshot { blockchain }) => {
                    if let ReplaceOutcome::Replaced { new_len, .. } = self.adopt_chain(blockchain).await? {
                        info!("Synced chain of length {} from {}", new_len, peer);
                    }
                }
                Ok(other) => warn!("{} answered NEW_PEER with {}", peer, other.kind()),
                Err(e) => warn!("Failed to announce to {}: {}", peer, e),
            }
        }

        info!(
            "✓ Joined network via {} ({} peers, chain length {})",
            bootstrap,
            self.directory.len(),
            self.ledger.chain().len()
        );
        Ok(())
    }

    /// Submit a local transaction and gossip it if it was new
    pub async fn submit_transaction(&self, tx: Transaction) -> NetworkResult<SubmitOutcome> {
        let outcome = self.ledger.submit_transaction(tx.clone())?;
        if outcome == SubmitOutcome::Accepted {
            self.gossip.broadcast_transaction(&tx).await;
        }
        Ok(outcome)
    }

    /// Announce departure to every peer, then stop
    pub async fn leave(&self) {
        let notified = self.gossip.broadcast_leave(&self.address).await;
        info!("Left network ({} peers notified)", notified);
        self.stop().await;
    }

    /// Stop accepting connections and cancel mining
    pub async fn stop(&self) {
        self.shutdown.send_replace(true);
        self.ledger.stop_mining();

        let tasks: Vec<_> = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for task in tasks {
            let _ = task.await;
        }
    }
}
