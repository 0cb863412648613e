// networking/src/peer.rs

use crate::{NetworkError, NetworkResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Network location of a peer's listener
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerAddress {
    pub address: String,
    pub port: u16,
}

impl PeerAddress {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

impl FromStr for PeerAddress {
    type Err = NetworkError;

    /// Parse `host:port`
    fn from_str(s: &str) -> NetworkResult<Self> {
        let (address, port) = s
            .rsplit_once(':')
            .ok_or_else(|| NetworkError::PeerError(format!("expected host:port, got '{}'", s)))?;
        if address.is_empty() {
            return Err(NetworkError::PeerError(format!("missing host in '{}'", s)));
        }
        let port = port
            .parse()
            .map_err(|_| NetworkError::PeerError(format!("invalid port in '{}'", s)))?;
        Ok(Self::new(address, port))
    }
}

/// Address book of known peers, keyed by address.
///
/// A later entry for the same address overwrites the port. The node's own
/// address is never recorded.
#[derive(Debug)]
pub struct PeerDirectory {
    self_address: PeerAddress,
    peers: Mutex<BTreeMap<String, u16>>,
}

impl PeerDirectory {
    pub fn new(self_address: PeerAddress) -> Self {
        Self {
            self_address,
            peers: Mutex::new(BTreeMap::new()),
        }
    }

    fn peers(&self) -> MutexGuard<'_, BTreeMap<String, u16>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn self_address(&self) -> &PeerAddress {
        &self.self_address
    }

    fn is_self(&self, address: &str, port: u16) -> bool {
        self.self_address.address == address && self.self_address.port == port
    }

    /// Record `peer`. Returns whether the directory changed.
    pub fn add(&self, peer: &PeerAddress) -> bool {
        if self.is_self(&peer.address, peer.port) {
            return false;
        }
        self.peers().insert(peer.address.clone(), peer.port) != Some(peer.port)
    }

    /// Merge a peer set received from another node
    pub fn merge(&self, other: BTreeMap<String, u16>) -> usize {
        let mut peers = self.peers();
        let mut changed = 0;
        for (address, port) in other {
            if self.is_self(&address, port) {
                continue;
            }
            if peers.insert(address, port) != Some(port) {
                changed += 1;
            }
        }
        changed
    }

    /// Remove `peer` only if both address and port match
    pub fn remove(&self, peer: &PeerAddress) -> bool {
        let mut peers = self.peers();
        if peers.get(&peer.address) == Some(&peer.port) {
            peers.remove(&peer.address);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, peer: &PeerAddress) -> bool {
        self.peers().get(&peer.address) == Some(&peer.port)
    }

    /// Copy of the current peers; callers do I/O on the copy
    pub fn snapshot(&self) -> Vec<PeerAddress> {
        self.peers()
            .iter()
            .map(|(address, port)| PeerAddress::new(address.clone(), *port))
            .collect()
    }

    /// Wire form for `PEERS_REPLY`
    pub fn as_map(&self) -> BTreeMap<String, u16> {
        self.peers().clone()
    }

    pub fn len(&self) -> usize {
        self.peers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers().is_empty()
    }
}
