use std::collections::BTreeSet;

use tilesync_shared::{PeerDirectory, PeerId};

/// The peers currently connected to the server
#[derive(Default)]
pub struct PeerRegistry {
    peers: BTreeSet<PeerId>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the peer was newly added
    pub fn insert(&mut self, peer: PeerId) -> bool {
        self.peers.insert(peer)
    }

    /// Returns whether the peer was connected
    pub fn remove(&mut self, peer: &PeerId) -> bool {
        self.peers.remove(peer)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerId> {
        self.peers.iter()
    }
}

impl PeerDirectory for PeerRegistry {
    fn current_peers(&self) -> Vec<PeerId> {
        self.peers.iter().copied().collect()
    }

    fn is_connected(&self, peer: &PeerId) -> bool {
        self.peers.contains(peer)
    }
}
