use std::{any::TypeId, collections::HashMap};

use log::debug;

use tilesync_serde::{ByteReader, SerdeErr};

use crate::{
    constants::RESERVED_MESSAGE_IDS,
    messages::{
        direction::MessageDirection,
        error::{MessageError, RegistryError},
        handler::{HandlerContext, HandlerReturn},
        message::Message,
    },
    types::{HostType, MessageId},
};

/// A handler with its payload decoding folded in
pub(crate) type BoxedHandler<S> =
    Box<dyn FnMut(&mut S, &mut HandlerContext, &[u8]) -> Result<HandlerReturn, SerdeErr>>;

pub(crate) struct RegistryEntry<S> {
    pub name: &'static str,
    pub kind: TypeId,
    pub direction: MessageDirection,
    /// `None` for types that are only ever consumed by a pending request
    pub handler: Option<BoxedHandler<S>>,
}

/// Explicit table from message id to codec and handler, validated as it is
/// built and locked once handed to a dispatcher.
pub struct RpcRegistry<S> {
    entries: HashMap<MessageId, Vec<RegistryEntry<S>>>,
    kinds: HashMap<TypeId, MessageId>,
    locked: bool,
}

impl<S: 'static> RpcRegistry<S> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            kinds: HashMap::new(),
            locked: false,
        }
    }

    /// Register a user message with a handler
    pub fn register<M, F>(
        &mut self,
        id: MessageId,
        direction: MessageDirection,
        handler: F,
    ) -> Result<(), RegistryError>
    where
        M: Message,
        F: FnMut(&mut S, &mut HandlerContext, M) -> HandlerReturn + 'static,
    {
        Self::check_reserved(id)?;
        self.insert::<M>(id, direction, Some(wrap_handler(handler)))
    }

    /// Register a user message that has no handler, such as a response type
    pub fn register_codec<M: Message>(
        &mut self,
        id: MessageId,
        direction: MessageDirection,
    ) -> Result<(), RegistryError> {
        Self::check_reserved(id)?;
        self.insert::<M>(id, direction, None)
    }

    /// Register one of the sync protocol's own messages under a reserved id
    pub(crate) fn register_internal<M, F>(
        &mut self,
        id: MessageId,
        direction: MessageDirection,
        handler: F,
    ) -> Result<(), RegistryError>
    where
        M: Message,
        F: FnMut(&mut S, &mut HandlerContext, M) -> HandlerReturn + 'static,
    {
        self.insert::<M>(id, direction, Some(wrap_handler(handler)))
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn is_registered(&self, id: MessageId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn id_of<M: Message>(&self) -> Option<MessageId> {
        self.kinds.get(&TypeId::of::<M>()).copied()
    }

    pub fn name_of(&self, id: MessageId) -> Option<&'static str> {
        self.entries
            .get(&id)
            .and_then(|entries| entries.first())
            .map(|entry| entry.name)
    }

    /// The id to send a message of `kind` with from `host_type`
    pub(crate) fn outgoing_id(
        &self,
        kind: TypeId,
        type_name: &'static str,
        host_type: HostType,
    ) -> Result<MessageId, MessageError> {
        let id = *self
            .kinds
            .get(&kind)
            .ok_or(MessageError::UnregisteredMessageType { type_name })?;
        let sendable = self.entries.get(&id).is_some_and(|entries| {
            entries
                .iter()
                .any(|entry| entry.kind == kind && entry.direction.can_send(host_type))
        });
        if !sendable {
            return Err(MessageError::DirectionNotAllowed { id });
        }
        Ok(id)
    }

    /// The id a message of type `M` arrives with at `host_type`
    pub(crate) fn incoming_id<M: Message>(&self, host_type: HostType) -> Result<MessageId, MessageError> {
        let kind = TypeId::of::<M>();
        let id = *self
            .kinds
            .get(&kind)
            .ok_or(MessageError::UnregisteredMessageType {
                type_name: M::name(),
            })?;
        let receivable = self.entries.get(&id).is_some_and(|entries| {
            entries
                .iter()
                .any(|entry| entry.kind == kind && entry.direction.can_receive(host_type))
        });
        if !receivable {
            return Err(MessageError::DirectionNotAllowed { id });
        }
        Ok(id)
    }

    pub(crate) fn incoming_entry_mut(
        &mut self,
        id: MessageId,
        host_type: HostType,
    ) -> Option<&mut RegistryEntry<S>> {
        self.entries
            .get_mut(&id)?
            .iter_mut()
            .find(|entry| entry.direction.can_receive(host_type))
    }

    fn check_reserved(id: MessageId) -> Result<(), RegistryError> {
        if id < RESERVED_MESSAGE_IDS {
            return Err(RegistryError::ReservedId {
                id,
                reserved: RESERVED_MESSAGE_IDS,
            });
        }
        Ok(())
    }

    fn insert<M: Message>(
        &mut self,
        id: MessageId,
        direction: MessageDirection,
        handler: Option<BoxedHandler<S>>,
    ) -> Result<(), RegistryError> {
        if self.locked {
            return Err(RegistryError::Locked);
        }

        let kind = TypeId::of::<M>();
        let name = M::name();

        if let Some(existing) = self.kinds.get(&kind) {
            if *existing != id {
                return Err(RegistryError::DuplicateType {
                    type_name: name,
                    existing: *existing,
                    incoming: id,
                });
            }
        }

        let entries = self.entries.entry(id).or_default();
        for entry in entries.iter_mut() {
            let same_direction = entry.direction == direction;
            if same_direction && entry.kind == kind {
                // a codec-only entry may be given its handler later, and vice versa
                let has_handler = entry.handler.is_some();
                match (has_handler, handler) {
                    (false, Some(handler)) => {
                        entry.handler = Some(handler);
                        return Ok(());
                    }
                    (_, None) => return Ok(()),
                    (true, Some(_)) => {
                        return Err(RegistryError::DuplicateRegistration {
                            id,
                            direction,
                            existing: entry.name,
                            incoming: name,
                        })
                    }
                }
            }
            if same_direction {
                return Err(RegistryError::DuplicateRegistration {
                    id,
                    direction,
                    existing: entry.name,
                    incoming: name,
                });
            }
            if entry.direction == MessageDirection::FromEither
                || direction == MessageDirection::FromEither
            {
                return Err(RegistryError::DirectionOverlap { id });
            }
        }

        debug!("registered message {} as id {} ({:?})", name, id, direction);
        entries.push(RegistryEntry {
            name,
            kind,
            direction,
            handler,
        });
        self.kinds.insert(kind, id);
        Ok(())
    }
}

impl<S: 'static> Default for RpcRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

fn wrap_handler<S, M, F>(mut handler: F) -> BoxedHandler<S>
where
    M: Message,
    F: FnMut(&mut S, &mut HandlerContext, M) -> HandlerReturn + 'static,
{
    Box::new(move |state, context, payload| {
        let mut reader = ByteReader::new(payload);
        let message = M::de(&mut reader)?;
        if !reader.is_empty() {
            return Err(SerdeErr);
        }
        Ok(handler(state, context, message))
    })
}
