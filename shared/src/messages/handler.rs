use std::time::Instant;

use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::{
    messages::{
        envelope::MessageFlags,
        message::{Message, MessageContainer},
    },
    types::{HostType, MessageId, PeerId, RequestId, StatusCode, STATUS_ABANDONED},
};

/// Error type handlers return; any error is contained at the dispatch boundary
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

pub type HandlerReturn = Result<HandlerResult, HandlerError>;

/// What a handler produced. Replies are sent by the dispatcher on the
/// handler's behalf; handlers never build envelopes.
pub enum HandlerResult {
    /// Nothing to report
    Done,
    /// Report a status back to a sender that asked for an acknowledgement
    Status(StatusCode),
    /// Report a status once it becomes available
    Deferred(DeferredStatus),
    /// Answer a request with a response message
    Respond(MessageContainer),
    /// The request will be answered later through its [`ResponseHandle`]
    Pending,
}

impl HandlerResult {
    pub fn respond<M: Message>(message: M) -> Self {
        HandlerResult::Respond(MessageContainer::new(message))
    }
}

/// Receiving half of a status that a handler will report later
pub struct DeferredStatus {
    receiver: oneshot::Receiver<StatusCode>,
}

/// Completing half of a [`DeferredStatus`]
pub struct StatusCompleter {
    sender: oneshot::Sender<StatusCode>,
}

impl DeferredStatus {
    pub fn new() -> (DeferredStatus, StatusCompleter) {
        let (sender, receiver) = oneshot::channel();
        (DeferredStatus { receiver }, StatusCompleter { sender })
    }

    /// `Some` once the status is known; a dropped completer reports `STATUS_ABANDONED`
    pub(crate) fn poll(&mut self) -> Option<StatusCode> {
        match self.receiver.try_recv() {
            Ok(status) => Some(status),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(STATUS_ABANDONED),
        }
    }
}

impl StatusCompleter {
    pub fn complete(self, status: StatusCode) {
        // the dispatcher may have shut down in the meantime
        let _ = self.sender.send(status);
    }
}

/// Lets a request be answered after its handler has returned
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResponseHandle {
    pub(crate) peer: PeerId,
    pub(crate) request_id: RequestId,
    pub(crate) run_original: bool,
}

impl ResponseHandle {
    pub fn peer(&self) -> PeerId {
        self.peer
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }
}

/// Recipient of an outgoing frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    Peer(PeerId),
    /// Every connected peer. From a client this means "the server".
    Broadcast,
    /// Every connected peer except one
    BroadcastExcept(PeerId),
}

pub(crate) struct OutgoingMessage {
    pub target: Target,
    pub flags: MessageFlags,
    pub message: MessageContainer,
}

/// Everything a handler can learn about the frame it is processing, and the
/// outbox it can queue further messages into
pub struct HandlerContext {
    host_type: HostType,
    sender: PeerId,
    message_id: MessageId,
    flags: MessageFlags,
    correlation_key: RequestId,
    received_at: Instant,
    outbox: Vec<OutgoingMessage>,
}

impl HandlerContext {
    pub(crate) fn new(
        host_type: HostType,
        sender: PeerId,
        message_id: MessageId,
        flags: MessageFlags,
        correlation_key: RequestId,
        received_at: Instant,
    ) -> Self {
        Self {
            host_type,
            sender,
            message_id,
            flags,
            correlation_key,
            received_at,
            outbox: Vec::new(),
        }
    }

    pub fn host_type(&self) -> HostType {
        self.host_type
    }

    pub fn sender(&self) -> PeerId {
        self.sender
    }

    pub fn message_id(&self) -> MessageId {
        self.message_id
    }

    pub fn flags(&self) -> MessageFlags {
        self.flags
    }

    pub fn correlation_key(&self) -> RequestId {
        self.correlation_key
    }

    pub fn received_at(&self) -> Instant {
        self.received_at
    }

    /// `Some` when the frame is a request awaiting a response
    pub fn response_handle(&self) -> Option<ResponseHandle> {
        if !self.flags.contains(MessageFlags::REQUEST) {
            return None;
        }
        Some(ResponseHandle {
            peer: self.sender,
            request_id: self.correlation_key,
            run_original: self
                .flags
                .contains(MessageFlags::RUN_ORIGINAL_ALONGSIDE_REQUEST),
        })
    }

    pub fn send<M: Message>(&mut self, peer: PeerId, message: M) {
        self.queue(Target::Peer(peer), MessageFlags::NONE, message);
    }

    pub fn broadcast<M: Message>(&mut self, message: M) {
        self.queue(Target::Broadcast, MessageFlags::NONE, message);
    }

    pub fn broadcast_except<M: Message>(&mut self, peer: PeerId, message: M) {
        self.queue(Target::BroadcastExcept(peer), MessageFlags::NONE, message);
    }

    pub fn queue<M: Message>(&mut self, target: Target, flags: MessageFlags, message: M) {
        self.outbox.push(OutgoingMessage {
            target,
            flags,
            message: MessageContainer::new(message),
        });
    }

    pub(crate) fn take_outbox(&mut self) -> Vec<OutgoingMessage> {
        std::mem::take(&mut self.outbox)
    }
}
