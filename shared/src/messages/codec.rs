use tilesync_serde::{ByteReader, ByteWriter, Serde};

use crate::{
    connection::ConnectionConfig,
    messages::{envelope::MessageEnvelope, error::MessageError},
};

/// Frames payloads behind a `MessageEnvelope` and splits received frames back
/// apart. Fails closed: anything inconsistent is `MalformedFrame`.
#[derive(Clone, Debug)]
pub struct FrameCodec {
    max_frame_bytes: usize,
}

impl FrameCodec {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self { max_frame_bytes }
    }

    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self::new(config.max_frame_bytes)
    }

    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    /// Largest payload that fits behind an envelope of the given shape
    pub fn max_payload(&self, keyed: bool) -> usize {
        let header = if keyed {
            MessageEnvelope::KEYED_SIZE
        } else {
            MessageEnvelope::BASE_SIZE
        };
        self.max_frame_bytes.saturating_sub(header)
    }

    pub fn encode(
        &self,
        envelope: &MessageEnvelope,
        payload: &[u8],
    ) -> Result<Box<[u8]>, MessageError> {
        if envelope.payload_size as usize != payload.len() {
            return Err(MessageError::MalformedFrame {
                reason: "declared payload size does not match payload",
            });
        }
        // the key only goes on the wire behind a request or response flag
        if envelope.is_correlated() && !envelope.flags.carries_key() {
            return Err(MessageError::MalformedFrame {
                reason: "correlation key without a request or response flag",
            });
        }

        let size = envelope.header_size() + payload.len();
        if size > self.max_frame_bytes {
            return Err(MessageError::FrameTooLarge {
                size,
                limit: self.max_frame_bytes,
            });
        }

        let mut writer = ByteWriter::with_capacity(size);
        envelope.ser(&mut writer);
        tilesync_serde::ByteWrite::write_bytes(&mut writer, payload);
        Ok(writer.to_bytes())
    }

    pub fn decode<'f>(
        &self,
        frame: &'f [u8],
    ) -> Result<(MessageEnvelope, &'f [u8]), MessageError> {
        if frame.len() > self.max_frame_bytes {
            return Err(MessageError::FrameTooLarge {
                size: frame.len(),
                limit: self.max_frame_bytes,
            });
        }

        let mut reader = ByteReader::new(frame);
        let envelope = MessageEnvelope::de(&mut reader).map_err(|_| MessageError::MalformedFrame {
            reason: "truncated or invalid envelope",
        })?;

        let remaining = reader.remaining_len();
        let payload_size = envelope.payload_size as usize;
        if payload_size > remaining {
            return Err(MessageError::MalformedFrame {
                reason: "payload size exceeds remaining bytes",
            });
        }
        if payload_size < remaining {
            return Err(MessageError::MalformedFrame {
                reason: "trailing bytes after payload",
            });
        }

        let payload = reader
            .read_bytes(payload_size)
            .map_err(|_| MessageError::MalformedFrame {
                reason: "payload size exceeds remaining bytes",
            })?;
        Ok((envelope, payload))
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::from_config(&ConnectionConfig::default())
    }
}
