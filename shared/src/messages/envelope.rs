// The fixed binary header preceding every message payload on the wire.
//
// Layout (little-endian):
//   u16 message_id | u8 flags | u32 payload_size | [i64 correlation_key]
// The correlation key is present only when one of the request/response
// flags is set.

use std::ops::{BitOr, BitOrAssign};

use tilesync_serde::{ByteReader, ByteWrite, ConstByteLength, Serde, SerdeErr};

use crate::types::{MessageId, RequestId};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MessageFlags(u8);

impl MessageFlags {
    pub const NONE: MessageFlags = MessageFlags(0);
    /// The sender expects a response message correlated by key
    pub const REQUEST: MessageFlags = MessageFlags(1 << 0);
    /// Invoke the registered handler even if the frame fulfilled a pending request
    pub const RUN_ORIGINAL_ALONGSIDE_REQUEST: MessageFlags = MessageFlags(1 << 1);
    /// This frame answers a `REQUEST`
    pub const REQUEST_RESPONSE: MessageFlags = MessageFlags(1 << 2);
    /// The sender expects an acknowledgement, optionally with an error code
    pub const ACKNOWLEDGE_REQUEST: MessageFlags = MessageFlags(1 << 3);
    /// This frame answers an `ACKNOWLEDGE_REQUEST`
    pub const ACKNOWLEDGE_RESPONSE: MessageFlags = MessageFlags(1 << 4);
    /// The hub should forward this frame to every other peer
    pub const RELAY: MessageFlags = MessageFlags(1 << 5);

    const ALL_BITS: u8 = 0b0011_1111;
    const KEYED_BITS: u8 = Self::REQUEST.0
        | Self::REQUEST_RESPONSE.0
        | Self::ACKNOWLEDGE_REQUEST.0
        | Self::ACKNOWLEDGE_RESPONSE.0;

    pub fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::ALL_BITS != 0 {
            return None;
        }
        Some(Self(bits))
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn contains(&self, other: MessageFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(&self, other: MessageFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: MessageFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: MessageFlags) {
        self.0 &= !other.0;
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Whether an envelope with these flags carries a correlation key
    pub fn carries_key(&self) -> bool {
        self.0 & Self::KEYED_BITS != 0
    }
}

impl BitOr for MessageFlags {
    type Output = MessageFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        MessageFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for MessageFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Header of one framed message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageEnvelope {
    pub message_id: MessageId,
    pub flags: MessageFlags,
    pub payload_size: u32,
    /// Zero means "not correlated with any request"
    pub correlation_key: RequestId,
}

impl MessageEnvelope {
    /// Bytes taken by an envelope without a correlation key
    pub const BASE_SIZE: usize = 7;
    /// Bytes taken by an envelope carrying a correlation key
    pub const KEYED_SIZE: usize = Self::BASE_SIZE + 8;

    pub fn new(message_id: MessageId, flags: MessageFlags, payload_size: u32) -> Self {
        Self {
            message_id,
            flags,
            payload_size,
            correlation_key: 0,
        }
    }

    pub fn keyed(
        message_id: MessageId,
        flags: MessageFlags,
        payload_size: u32,
        correlation_key: RequestId,
    ) -> Self {
        Self {
            message_id,
            flags,
            payload_size,
            correlation_key,
        }
    }

    pub fn is_correlated(&self) -> bool {
        self.correlation_key != 0
    }

    pub fn header_size(&self) -> usize {
        if self.flags.carries_key() {
            Self::KEYED_SIZE
        } else {
            Self::BASE_SIZE
        }
    }
}

impl Serde for MessageEnvelope {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.message_id.ser(writer);
        self.flags.bits().ser(writer);
        self.payload_size.ser(writer);
        if self.flags.carries_key() {
            self.correlation_key.ser(writer);
        }
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let message_id = MessageId::de(reader)?;
        let flags = MessageFlags::from_bits(u8::de(reader)?).ok_or(SerdeErr)?;
        let payload_size = u32::de(reader)?;
        let correlation_key = if flags.carries_key() {
            RequestId::de(reader)?
        } else {
            0
        };

        Ok(Self {
            message_id,
            flags,
            payload_size,
            correlation_key,
        })
    }

    fn byte_length(&self) -> u32 {
        let mut output = <MessageId as ConstByteLength>::const_byte_length()
            + <u8 as ConstByteLength>::const_byte_length()
            + <u32 as ConstByteLength>::const_byte_length();
        if self.flags.carries_key() {
            output += <RequestId as ConstByteLength>::const_byte_length();
        }
        output
    }
}
