use thiserror::Error;

use crate::{
    sync::adapter::AdapterError,
    types::{PacketId, SessionId},
};

/// Errors that can occur while sending or reassembling a chunked transfer.
/// None of them are fatal: the session is discarded and a fresh one replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// Packets were missing at the finality check
    #[error("Transfer session {session} incomplete: received {received} of {expected} packets")]
    TransferIncomplete {
        session: SessionId,
        received: u32,
        expected: u32,
    },

    /// A start header that contradicts itself or the packets that follow it
    #[error("Transfer header mismatch: {reason}")]
    HeaderMismatch { reason: &'static str },

    /// A packet id beyond the session's packet count, or one that would
    /// write past the end of the buffer
    #[error("Packet {packet_id} is out of range for session {session} ({packet_count} packets)")]
    PacketOutOfRange {
        session: SessionId,
        packet_id: PacketId,
        packet_count: u32,
    },

    /// The spill file could not be created, written or read back
    #[error("Spill file error: {reason}")]
    SpillIo { reason: String },

    #[error("Compression error: {reason}")]
    Compression { reason: String },

    /// The world-state collaborator rejected the data
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}
