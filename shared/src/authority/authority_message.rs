use tilesync_serde::{ByteReader, ByteWrite, ConstByteLength, Serde, SerdeErr};

use crate::{messages::message::Message, sync::resource::ResourceClass, types::PeerId};

/// Announces the new owner of a resource class. An owner of `PeerId::SERVER`
/// means the server holds it as a fallback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthorityChange {
    pub class: ResourceClass,
    pub owner: PeerId,
}

impl AuthorityChange {
    pub fn new(class: ResourceClass, owner: PeerId) -> Self {
        Self { class, owner }
    }
}

impl Serde for AuthorityChange {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.class.ser(writer);
        self.owner.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            class: ResourceClass::de(reader)?,
            owner: PeerId::de(reader)?,
        })
    }

    fn byte_length(&self) -> u32 {
        Self::const_byte_length()
    }
}

impl ConstByteLength for AuthorityChange {
    fn const_byte_length() -> u32 {
        <ResourceClass as ConstByteLength>::const_byte_length()
            + <PeerId as ConstByteLength>::const_byte_length()
    }
}

impl Message for AuthorityChange {
    fn name() -> &'static str {
        "AuthorityChange"
    }
}
