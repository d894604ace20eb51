use std::default::Default;

use tilesync_shared::{ConnectionConfig, PeerId, TransferConfig};

/// Contains Config properties which will be used by a Client
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// This client's id. Must be unique among the server's peers and never
    /// `PeerId::SERVER`.
    pub peer_id: PeerId,
    /// Used to configure frame limits and request timeouts
    pub connection: ConnectionConfig,
    /// Used to configure pacing, reassembly and spilling of chunked transfers
    pub transfer: TransferConfig,
}

impl ClientConfig {
    pub fn new(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            ..Default::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            peer_id: PeerId::new(1),
            connection: ConnectionConfig::default(),
            transfer: TransferConfig::default(),
        }
    }
}
