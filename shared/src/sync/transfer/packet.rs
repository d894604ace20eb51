use tilesync_serde::{ByteReader, ByteWrite, ConstByteLength, Serde, SerdeErr};

use crate::{
    messages::message::Message,
    sync::{
        resource::ResourceClass,
        transfer::header::{PacketHeader, StartHeader},
    },
    types::{PacketId, SessionId},
};

/// One chunk of a transfer session, riding in an ordinary envelope
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferPacket {
    pub class: ResourceClass,
    pub session: SessionId,
    pub packet_id: PacketId,
    /// Present exactly on packet 0
    pub start: Option<StartHeader>,
    pub payload: Vec<u8>,
}

impl TransferPacket {
    pub fn first(
        class: ResourceClass,
        session: SessionId,
        start: StartHeader,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            class,
            session,
            packet_id: 0,
            start: Some(start),
            payload,
        }
    }

    pub fn subsequent(
        class: ResourceClass,
        session: SessionId,
        packet_id: PacketId,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            class,
            session,
            packet_id,
            start: None,
            payload,
        }
    }

    /// Header bytes in front of packet 0's payload, the largest of any packet
    pub fn max_header_size() -> usize {
        PacketHeader::SIZE as usize + <StartHeader as ConstByteLength>::const_byte_length() as usize
    }

    pub fn header_size(&self) -> u16 {
        let mut size = PacketHeader::SIZE;
        if self.start.is_some() {
            size += <StartHeader as ConstByteLength>::const_byte_length() as u16;
        }
        size
    }

    pub fn header(&self) -> PacketHeader {
        PacketHeader {
            header_size: self.header_size(),
            class: self.class,
            session: self.session,
            packet_id: self.packet_id,
            packet_length: self.payload.len() as u32,
        }
    }
}

impl Serde for TransferPacket {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.header().ser(writer);
        if let Some(start) = &self.start {
            start.ser(writer);
        }
        writer.write_bytes(&self.payload);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let header = PacketHeader::de(reader)?;
        let start = if header.packet_id == 0 {
            Some(StartHeader::de(reader)?)
        } else {
            None
        };
        let packet = Self {
            class: header.class,
            session: header.session,
            packet_id: header.packet_id,
            start,
            payload: Vec::new(),
        };
        if packet.header_size() != header.header_size {
            return Err(SerdeErr);
        }
        let payload = reader.read_bytes(header.packet_length as usize)?.to_vec();
        Ok(Self { payload, ..packet })
    }

    fn byte_length(&self) -> u32 {
        self.header_size() as u32 + self.payload.len() as u32
    }
}

impl Message for TransferPacket {
    fn name() -> &'static str {
        "TransferPacket"
    }
}
