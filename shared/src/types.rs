use std::fmt::{Display, Formatter};

use tilesync_serde::{ByteReader, ByteWrite, ConstByteLength, Serde, SerdeErr};

pub type MessageId = u16;
pub type RequestId = i64;
pub type StatusCode = u32;
pub type SessionId = u16;
pub type PacketId = u32;

/// Status sent back for an acknowledged message that was handled cleanly
pub const STATUS_OK: StatusCode = 0;
/// Status sent back when the handler of an acknowledged message faulted
pub const STATUS_HANDLER_FAULT: StatusCode = u32::MAX;
/// Status sent back when a deferred result was dropped without completing
pub const STATUS_ABANDONED: StatusCode = u32::MAX - 1;

/// Identity of a connected peer. `PeerId::SERVER` (zero) is the hub.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(u64);

impl PeerId {
    pub const SERVER: PeerId = PeerId(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn to_u64(&self) -> u64 {
        self.0
    }

    pub fn is_server(&self) -> bool {
        self.0 == 0
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_server() {
            write!(f, "server")
        } else {
            write!(f, "peer#{}", self.0)
        }
    }
}

impl Serde for PeerId {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.0.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self(u64::de(reader)?))
    }

    fn byte_length(&self) -> u32 {
        8
    }
}

impl ConstByteLength for PeerId {
    fn const_byte_length() -> u32 {
        8
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostType {
    Server,
    Client,
}

impl HostType {
    pub fn invert(self) -> Self {
        match self {
            HostType::Server => HostType::Client,
            HostType::Client => HostType::Server,
        }
    }
}
