// networking/src/gossip.rs

use crate::{peer::PeerDirectory, protocol::WireMessage, transport::Transport, PeerAddress};
use blockchain_core::{Chain, Transaction};
use std::sync::Arc;

/// Fan-out of a message to every known peer, one connection each.
///
/// Peers are visited sequentially from a snapshot of the directory; a
/// failing peer is logged and skipped.
pub struct GossipService {
    transport: Arc<dyn Transport>,
    directory: Arc<PeerDirectory>,
}

impl GossipService {
    pub fn new(transport: Arc<dyn Transport>, directory: Arc<PeerDirectory>) -> Self {
        Self {
            transport,
            directory,
        }
    }

    /// Send `message` to all peers; returns how many accepted it
    pub async fn broadcast(&self, message: &WireMessage) -> usize {
        let peers = self.directory.snapshot();
        let mut delivered = 0;

        for peer in &peers {
            match self.transport.send(peer, message).await {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!("Failed to send {} to {}: {}", message.kind(), peer, e),
            }
        }

        tracing::debug!(
            "Broadcast {} to {}/{} peers",
            message.kind(),
            delivered,
            peers.len()
        );
        delivered
    }

    pub async fn broadcast_chain(&self, chain: &Chain) -> usize {
        self.broadcast(&WireMessage::ChainSnapshot {
            blockchain: chain.to_blocks(),
        })
        .await
    }

    pub async fn broadcast_transaction(&self, tx: &Transaction) -> usize {
        self.broadcast(&WireMessage::NewTransaction {
            transaction: tx.clone(),
        })
        .await
    }

    pub async fn broadcast_leave(&self, me: &PeerAddress) -> usize {
        self.broadcast(&WireMessage::Leave {
            address: me.address.clone(),
            port: me.port,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NetworkError, NetworkResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records sends; peers on port 0 are unreachable
    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(PeerAddress, WireMessage)>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, peer: &PeerAddress, message: &WireMessage) -> NetworkResult<()> {
            if peer.port == 0 {
                return Err(NetworkError::ConnectionError("unreachable".into()));
            }
            self.sent.lock().unwrap().push((peer.clone(), message.clone()));
            Ok(())
        }

        async fn request(&self, _peer: &PeerAddress, _message: &WireMessage) -> NetworkResult<WireMessage> {
            Err(NetworkError::ProtocolError("not used".into()))
        }
    }

    fn service(peers: &[PeerAddress]) -> (GossipService, Arc<RecordingTransport>) {
        let directory = Arc::new(PeerDirectory::new(PeerAddress::new("127.0.0.1", 1)));
        for peer in peers {
            directory.add(peer);
        }
        let transport = Arc::new(RecordingTransport::default());
        (GossipService::new(transport.clone(), directory), transport)
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_peer() {
        let peers = vec![PeerAddress::new("10.0.0.1", 5000), PeerAddress::new("10.0.0.2", 5000)];
        let (gossip, transport) = service(&peers);

        let delivered = gossip.broadcast_chain(&Chain::genesis()).await;
        assert_eq!(delivered, 2);

        let sent = transport.sent.lock().unwrap();
        let targets: Vec<_> = sent.iter().map(|(peer, _)| peer.clone()).collect();
        assert_eq!(targets, peers);
        assert!(sent.iter().all(|(_, m)| m.kind() == "CHAIN_SNAPSHOT"));
    }

    #[tokio::test]
    async fn test_unreachable_peer_does_not_stop_fanout() {
        let peers = vec![PeerAddress::new("10.0.0.1", 0), PeerAddress::new("10.0.0.2", 5000)];
        let (gossip, transport) = service(&peers);

        let delivered = gossip.broadcast_leave(&PeerAddress::new("127.0.0.1", 1)).await;
        assert_eq!(delivered, 1);
        assert_eq!(transport.sent.lock().unwrap()[0].0, peers[1]);
    }

    #[tokio::test]
    async fn test_no_peers() {
        let (gossip, _) = service(&[]);
        let tx = Transaction::with_timestamp("a", "b", 1.0, 1.0);
        assert_eq!(gossip.broadcast_transaction(&tx).await, 0);
    }
}
