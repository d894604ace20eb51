//! # Tilesync Client
//! An editing peer: claims authority over resource classes, invalidates the
//! regions it edits and streams them to the server.

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

mod client;
mod error;

pub use client::{Client, ClientConfig};
pub use error::TileSyncClientError;
pub use tilesync_shared::{
    AuthorityChanged, AuthorityChangedEvent, ConnectEvent, DisconnectEvent, ErrorEvent,
    MessageEvent, RegionApplied, RegionAppliedEvent, RegionSent, RegionSentEvent, RequestEvent,
    SyncEvent, SyncEvents as Events, TransferDiscarded, TransferDiscardedEvent,
};
