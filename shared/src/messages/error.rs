use thiserror::Error;

use crate::{messages::direction::MessageDirection, types::MessageId};

/// Errors that can occur while framing or routing a message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    /// The frame could not be decoded; it is dropped and the connection survives
    #[error("Malformed frame: {reason}")]
    MalformedFrame { reason: &'static str },

    /// No handler or codec is registered for this id in the receiving direction
    #[error("Unknown message id {id}. The message type must be registered with the Protocol")]
    UnknownMessageId { id: MessageId },

    /// The encoded frame would exceed what the transport carries in one piece
    #[error("Frame of {size} bytes exceeds the transport limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },

    /// Attempted to send a Rust type that was never registered
    #[error("Message type {type_name} is not registered with the Protocol")]
    UnregisteredMessageType { type_name: &'static str },

    /// The message is registered, but not for sending from this host
    #[error("Message id {id} may not be sent from this host")]
    DirectionNotAllowed { id: MessageId },
}

/// Configuration errors surfaced when the registry is built, never at runtime
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Two different message types claim the same id in the same direction
    #[error("Message id {id} ({direction:?}) is already registered to {existing}, cannot register {incoming}")]
    DuplicateRegistration {
        id: MessageId,
        direction: MessageDirection,
        existing: &'static str,
        incoming: &'static str,
    },

    /// An id registered for `FromEither` also appears with a one-way direction
    #[error("Message id {id} is registered both for FromEither and for a single direction")]
    DirectionOverlap { id: MessageId },

    /// A message type is registered under two different ids
    #[error("Message type {type_name} is already registered under id {existing}, cannot also use id {incoming}")]
    DuplicateType {
        type_name: &'static str,
        existing: MessageId,
        incoming: MessageId,
    },

    /// User messages may not use the ids reserved for the sync protocol
    #[error("Message id {id} is reserved for the sync protocol (ids below {reserved})")]
    ReservedId { id: MessageId, reserved: MessageId },

    /// Registration after the registry was handed to a dispatcher
    #[error("The registry is locked; register every message before creating the context")]
    Locked,
}

/// A handler failed while processing a message. Contained at the dispatch boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Handler {handler} for message id {message_id} faulted: {reason}")]
pub struct HandlerFault {
    pub handler: &'static str,
    pub message_id: MessageId,
    pub reason: String,
}
