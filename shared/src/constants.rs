use std::time::Duration;

/// Largest frame the transport is trusted to deliver in one piece
pub const DEFAULT_MAX_FRAME_BYTES: usize = tilesync_serde::MTU_SIZE_BYTES;

/// Data bytes carried by one transfer packet, excluding its headers
pub const DEFAULT_MAX_PACKET_PAYLOAD: usize = 1024;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Requests asking for longer than this are clamped
pub const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Message ids below this value belong to the sync protocol itself
pub const RESERVED_MESSAGE_IDS: u16 = 16;

pub const AUTHORITY_CHANGE_MESSAGE_ID: u16 = 1;
pub const TRANSFER_PACKET_MESSAGE_ID: u16 = 2;
