use crate::types::PeerId;

/// Who is connected, as known by whoever owns the connections
pub trait PeerDirectory {
    fn current_peers(&self) -> Vec<PeerId>;
    fn is_connected(&self, peer: &PeerId) -> bool;
}

impl PeerDirectory for Vec<PeerId> {
    fn current_peers(&self) -> Vec<PeerId> {
        self.clone()
    }

    fn is_connected(&self, peer: &PeerId) -> bool {
        self.contains(peer)
    }
}
