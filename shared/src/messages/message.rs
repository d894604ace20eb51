use std::any::{Any, TypeId};

use tilesync_serde::{ByteWrite, ByteWriter, Serde};

/// A payload that can be registered with the Protocol and sent in an envelope
pub trait Message: Serde + 'static {
    fn name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

trait ErasedMessage {
    fn kind(&self) -> TypeId;
    fn name(&self) -> &'static str;
    fn write(&self, writer: &mut dyn ByteWrite);
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<M: Message> ErasedMessage for M {
    fn kind(&self) -> TypeId {
        TypeId::of::<M>()
    }

    fn name(&self) -> &'static str {
        <M as Message>::name()
    }

    fn write(&self, writer: &mut dyn ByteWrite) {
        self.ser(writer);
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A type-erased message, queued by handlers and encoded by the dispatcher
pub struct MessageContainer {
    inner: Box<dyn ErasedMessage>,
}

impl MessageContainer {
    pub fn new<M: Message>(message: M) -> Self {
        Self {
            inner: Box::new(message),
        }
    }

    pub fn kind(&self) -> TypeId {
        self.inner.kind()
    }

    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    pub fn to_payload(&self) -> Box<[u8]> {
        let mut writer = ByteWriter::new();
        self.inner.write(&mut writer);
        writer.to_bytes()
    }

    pub fn downcast<M: Message>(self) -> Option<M> {
        self.inner.into_any().downcast::<M>().ok().map(|message| *message)
    }
}

impl std::fmt::Debug for MessageContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MessageContainer({})", self.name())
    }
}
