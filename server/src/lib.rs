//! # Tilesync Server
//! The hub end of tilesync: arbitrates authority over each resource class,
//! relays peer traffic and streams dirty regions to connected clients.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod transport;
pub mod shared {
    pub use tilesync_shared::{
        ByteReader, ByteWrite, ByteWriter, ConnectionConfig, ConstByteLength, Serde, SerdeErr,
        TransferConfig,
    };
}

mod error;
mod server;

pub use error::TileSyncServerError;
pub use server::{PeerRegistry, Server, ServerConfig};
pub use tilesync_shared::{
    AuthorityChanged, AuthorityChangedEvent, ConnectEvent, DisconnectEvent, ErrorEvent,
    MessageEvent, RegionApplied, RegionAppliedEvent, RegionSent, RegionSentEvent, RequestEvent,
    SyncEvent, SyncEvents as Events, TransferDiscarded, TransferDiscardedEvent,
};
