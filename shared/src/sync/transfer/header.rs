use tilesync_serde::{ByteReader, ByteWrite, ConstByteLength, Serde, SerdeErr};

use crate::{
    sync::{
        resource::{Bounds, RegionKind, ResourceClass, ResourceKey},
        transfer::error::TransferError,
    },
    types::{PacketId, SessionId},
};

/// Leads every transfer packet
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketHeader {
    /// Bytes from the start of the packet to its payload
    pub header_size: u16,
    pub class: ResourceClass,
    pub session: SessionId,
    pub packet_id: PacketId,
    /// Payload bytes carried by this packet
    pub packet_length: u32,
}

impl PacketHeader {
    pub const SIZE: u16 = 13;
}

impl Serde for PacketHeader {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.header_size.ser(writer);
        self.class.ser(writer);
        self.session.ser(writer);
        self.packet_id.ser(writer);
        self.packet_length.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            header_size: u16::de(reader)?,
            class: ResourceClass::de(reader)?,
            session: SessionId::de(reader)?,
            packet_id: PacketId::de(reader)?,
            packet_length: u32::de(reader)?,
        })
    }

    fn byte_length(&self) -> u32 {
        Self::SIZE as u32
    }
}

/// Follows the packet header of packet 0 and describes the whole session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StartHeader {
    pub key: ResourceKey,
    pub kind: RegionKind,
    pub bounds: Bounds,
    /// Bytes on the wire, after compression
    pub total_length: u32,
    pub packet_count: u32,
    /// Payload bytes per packet; packet `k` lands at `k * chunk_size`
    pub chunk_size: u32,
    /// Bytes handed to the adapter, before compression
    pub raw_length: u32,
    pub compressed: bool,
}

impl StartHeader {
    pub fn expected_packet_count(total_length: u32, chunk_size: u32) -> u32 {
        if chunk_size == 0 {
            return 1;
        }
        total_length.div_ceil(chunk_size).max(1)
    }

    /// Reject headers whose numbers do not add up
    pub fn validate(&self, class: ResourceClass) -> Result<(), TransferError> {
        if self.chunk_size == 0 {
            return Err(TransferError::HeaderMismatch {
                reason: "chunk size is zero",
            });
        }
        if self.packet_count != Self::expected_packet_count(self.total_length, self.chunk_size) {
            return Err(TransferError::HeaderMismatch {
                reason: "packet count does not match total length and chunk size",
            });
        }
        if self.kind.class() != class {
            return Err(TransferError::HeaderMismatch {
                reason: "region kind belongs to another resource class",
            });
        }
        if !self.compressed && self.raw_length != self.total_length {
            return Err(TransferError::HeaderMismatch {
                reason: "uncompressed session with differing raw length",
            });
        }
        Ok(())
    }

    /// Payload length packet `packet_id` must carry
    pub fn packet_length(&self, packet_id: PacketId) -> Option<u32> {
        if packet_id >= self.packet_count {
            return None;
        }
        let offset = packet_id as u64 * self.chunk_size as u64;
        let remaining = (self.total_length as u64).saturating_sub(offset);
        Some(remaining.min(self.chunk_size as u64) as u32)
    }
}

impl Serde for StartHeader {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.key.ser(writer);
        self.kind.ser(writer);
        self.bounds.ser(writer);
        self.total_length.ser(writer);
        self.packet_count.ser(writer);
        self.chunk_size.ser(writer);
        self.raw_length.ser(writer);
        self.compressed.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            key: ResourceKey::de(reader)?,
            kind: RegionKind::de(reader)?,
            bounds: Bounds::de(reader)?,
            total_length: u32::de(reader)?,
            packet_count: u32::de(reader)?,
            chunk_size: u32::de(reader)?,
            raw_length: u32::de(reader)?,
            compressed: bool::de(reader)?,
        })
    }

    fn byte_length(&self) -> u32 {
        Self::const_byte_length()
    }
}

impl ConstByteLength for StartHeader {
    fn const_byte_length() -> u32 {
        <ResourceKey as ConstByteLength>::const_byte_length()
            + <RegionKind as ConstByteLength>::const_byte_length()
            + <Bounds as ConstByteLength>::const_byte_length()
            + 4 * <u32 as ConstByteLength>::const_byte_length()
            + <bool as ConstByteLength>::const_byte_length()
    }
}
