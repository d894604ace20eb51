//! # Tilesync Shared
//! Common functionality shared between tilesync-server & tilesync-client crates.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

#[macro_use]
extern crate cfg_if;

pub use tilesync_serde::{
    ByteReader, ByteWrite, ByteWriter, ConstByteLength, Serde, SerdeErr, MTU_SIZE_BYTES,
};

mod backends;
mod connection;
mod constants;
mod context;
mod error;
mod protocol;
mod types;
mod wrapping_number;

pub mod authority;
pub mod messages;
pub mod sync;

pub use backends::{TimeError, Timer, Timestamp};
pub use connection::ConnectionConfig;
pub use constants::{
    AUTHORITY_CHANGE_MESSAGE_ID, DEFAULT_MAX_FRAME_BYTES, DEFAULT_MAX_PACKET_PAYLOAD,
    DEFAULT_REQUEST_TIMEOUT, MAX_REQUEST_TIMEOUT, RESERVED_MESSAGE_IDS,
    TRANSFER_PACKET_MESSAGE_ID,
};
pub use context::{SyncContext, SyncState};
pub use error::SyncError;
pub use protocol::{Protocol, ProtocolPlugin};
pub use types::{
    HostType, MessageId, PacketId, PeerId, RequestId, SessionId, StatusCode, STATUS_ABANDONED,
    STATUS_HANDLER_FAULT, STATUS_OK,
};
pub use wrapping_number::{sequence_greater_than, sequence_less_than, wrapping_diff};

pub use authority::{
    AuthorityChange, AuthorityError, AuthorityRegister, AuthorityState, AuthorityTransition,
    PeerDirectory,
};
pub use messages::{
    request::{AckFuture, AckOutcome, RequestOutcome, ResponseContext, ResponseFuture},
    DeferredStatus, DispatchOutcome, Dispatcher, DropReason, FrameCodec, HandlerContext,
    HandlerError, HandlerFault, HandlerResult, HandlerReturn, Message, MessageContainer,
    MessageDirection, MessageEnvelope, MessageError, MessageFlags, OutgoingFrame, RegistryError,
    RequestOptions, ResponseHandle, RpcRegistry, StatusCompleter, Target,
};
pub use sync::{
    transfer::{CompressionMode, TransferConfig, TransferError, TransferPacket},
    AdapterError, AuthorityChanged, AuthorityChangedEvent, Bounds, ConnectEvent, DirtyRegion,
    DirtyRegionTracker, DisconnectEvent, EntityHandle, ErrorEvent, MessageEvent, RegionApplied,
    RegionAppliedEvent, RegionId, RegionKind, RegionSent, RegionSentEvent, RequestEvent,
    ResourceAdapter, ResourceClass, ResourceKey, ResourceSync, SyncEvent, SyncEvents,
    TransferDiscarded, TransferDiscardedEvent,
};
