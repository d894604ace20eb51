use std::{path::PathBuf, time::Duration};

use log::warn;

use crate::{
    constants::DEFAULT_MAX_PACKET_PAYLOAD,
    sync::transfer::{TransferError, TransferPacket},
};

/// How snapshots are compressed before they are chunked
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompressionMode {
    /// zstd at the given level. Needs the `zstd_support` feature; without it
    /// snapshots go out uncompressed.
    Zstd(i32),
}

/// Contains config properties which will be used by the chunked transfer engine
#[derive(Clone, Debug)]
pub struct TransferConfig {
    /// Largest payload carried by a single transfer packet
    pub max_packet_payload: usize,
    /// Minimum wait between gaining authority and sending the first packet
    pub first_packet_delay: Duration,
    /// Minimum wait between two consecutive packets
    pub packet_interval: Duration,
    /// A region must be untouched this long before it is sent
    pub debounce: Duration,
    /// A region is sent anyway once it has been dirty this long
    pub force_after: Duration,
    /// How long a receiver waits for stragglers after the final packet
    pub reorder_grace: Duration,
    /// A receive session older than this is discarded
    pub receive_timeout: Duration,
    /// Receive sessions larger than this are written to a spill file
    pub spill_threshold: usize,
    pub spill_dir: PathBuf,
    pub compression: Option<CompressionMode>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_packet_payload: DEFAULT_MAX_PACKET_PAYLOAD,
            first_packet_delay: Duration::from_millis(100),
            packet_interval: Duration::from_millis(16),
            debounce: Duration::from_millis(500),
            force_after: Duration::from_secs(5),
            reorder_grace: Duration::from_millis(250),
            receive_timeout: Duration::from_secs(10),
            spill_threshold: 4 * 1024 * 1024,
            spill_dir: std::env::temp_dir(),
            compression: None,
        }
    }
}

impl TransferConfig {
    /// Shrinks `max_packet_payload` so that a full packet, headers included,
    /// fits in a message payload of `max_message_payload` bytes
    pub fn fit_to_frame(&self, max_message_payload: usize) -> Result<Self, TransferError> {
        let available = max_message_payload.saturating_sub(TransferPacket::max_header_size());
        if available == 0 || self.max_packet_payload == 0 {
            return Err(TransferError::HeaderMismatch {
                reason: "no room for a transfer payload in a frame",
            });
        }
        let mut fitted = self.clone();
        if fitted.max_packet_payload > available {
            warn!(
                "max_packet_payload {} does not fit in a frame, using {}",
                fitted.max_packet_payload, available
            );
            fitted.max_packet_payload = available;
        }
        Ok(fitted)
    }
}
