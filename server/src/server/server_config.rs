use std::default::Default;

use tilesync_shared::{ConnectionConfig, TransferConfig};

/// Contains Config properties which will be used by the Server
#[derive(Clone, Debug, Default)]
pub struct ServerConfig {
    /// Used to configure frame limits and request timeouts
    pub connection: ConnectionConfig,
    /// Used to configure pacing, reassembly and spilling of chunked transfers
    pub transfer: TransferConfig,
}
