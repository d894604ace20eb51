use std::{
    any::Any,
    collections::VecDeque,
    panic::{catch_unwind, AssertUnwindSafe},
    time::{Duration, Instant},
};

use log::{debug, trace, warn};

use crate::{
    connection::ConnectionConfig,
    messages::{
        codec::FrameCodec,
        envelope::{MessageEnvelope, MessageFlags},
        error::{HandlerFault, MessageError},
        handler::{
            DeferredStatus, HandlerContext, HandlerResult, OutgoingMessage, ResponseHandle,
            Target,
        },
        message::{Message, MessageContainer},
        registry::RpcRegistry,
        request::{clamp_timeout, AckFuture, PendingKey, PendingRequests, RequestIdGenerator, ResponseFuture},
    },
    types::{HostType, MessageId, PeerId, RequestId, StatusCode, STATUS_HANDLER_FAULT, STATUS_OK},
};

/// A fully encoded frame waiting for the transport
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingFrame {
    pub target: Target,
    pub frame: Box<[u8]>,
}

/// Why a received frame was not handed to a handler or a pending request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropReason {
    Malformed(MessageError),
    UnknownMessageId(MessageId),
    /// A reply whose request already completed, expired or never existed
    UnmatchedReply,
    HandlerFault(HandlerFault),
}

/// What happened to one received frame
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A handler processed the frame
    Handled,
    /// The frame completed a pending request and nothing else
    Fulfilled,
    Dropped(DropReason),
}

/// Options for an outgoing request
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestOptions {
    /// Falls back to the connection's default request timeout
    pub timeout: Option<Duration>,
    /// Ask the remote side to also run the reply's own handler here
    pub run_original: bool,
    /// Ask the server to forward the request to every other peer
    pub relay: bool,
}

impl RequestOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Default::default()
        }
    }
}

struct PendingAck {
    peer: PeerId,
    message_id: MessageId,
    request_id: RequestId,
    status: DeferredStatus,
}

/// Routes inbound frames to pending requests or registered handlers and
/// encodes everything handlers and callers want to send.
///
/// The dispatcher never talks to a transport: received frames are pushed in
/// through [`Dispatcher::dispatch`], encoded frames are pulled out through
/// [`Dispatcher::take_outgoing`].
pub struct Dispatcher<S> {
    host_type: HostType,
    registry: RpcRegistry<S>,
    codec: FrameCodec,
    config: ConnectionConfig,
    pending: PendingRequests,
    request_ids: RequestIdGenerator,
    deferred_acks: Vec<PendingAck>,
    outgoing: VecDeque<OutgoingFrame>,
}

impl<S: 'static> Dispatcher<S> {
    pub fn new(host_type: HostType, mut registry: RpcRegistry<S>, config: ConnectionConfig) -> Self {
        registry.lock();
        Self {
            host_type,
            registry,
            codec: FrameCodec::from_config(&config),
            config,
            pending: PendingRequests::new(),
            request_ids: RequestIdGenerator::new(),
            deferred_acks: Vec::new(),
            outgoing: VecDeque::new(),
        }
    }

    pub fn host_type(&self) -> HostType {
        self.host_type
    }

    pub fn registry(&self) -> &RpcRegistry<S> {
        &self.registry
    }

    pub fn codec(&self) -> &FrameCodec {
        &self.codec
    }

    pub fn pending(&self) -> &PendingRequests {
        &self.pending
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    // Sending

    pub fn send<M: Message>(&mut self, target: Target, message: M) -> Result<(), MessageError> {
        self.send_with_flags(target, MessageFlags::NONE, message)
    }

    pub fn send_with_flags<M: Message>(
        &mut self,
        target: Target,
        flags: MessageFlags,
        message: M,
    ) -> Result<(), MessageError> {
        let container = MessageContainer::new(message);
        self.queue_container(target, flags, 0, &container)
    }

    /// Send `message` and await a response of type `R`
    pub fn request<Q: Message, R: Message>(
        &mut self,
        target: Target,
        message: Q,
        options: RequestOptions,
        now: Instant,
    ) -> Result<ResponseFuture<R>, MessageError> {
        let response_id = self.registry.incoming_id::<R>(self.host_type)?;
        let container = MessageContainer::new(message);
        let request_id = self.request_ids.next_id();
        let flags = Self::request_flags(MessageFlags::REQUEST, &options);

        self.queue_container(target, flags, request_id, &container)?;
        let timeout = self.resolve_timeout(&options);
        Ok(self
            .pending
            .insert_response::<R>(PendingKey::new(request_id, response_id), now, timeout))
    }

    /// Send `message` and await an acknowledgement with an optional error code
    pub fn request_ack<M: Message>(
        &mut self,
        target: Target,
        message: M,
        options: RequestOptions,
        now: Instant,
    ) -> Result<AckFuture, MessageError> {
        let container = MessageContainer::new(message);
        let message_id =
            self.registry
                .outgoing_id(container.kind(), container.name(), self.host_type)?;
        let request_id = self.request_ids.next_id();
        let flags = Self::request_flags(MessageFlags::ACKNOWLEDGE_REQUEST, &options);

        self.queue_container(target, flags, request_id, &container)?;
        let timeout = self.resolve_timeout(&options);
        Ok(self
            .pending
            .insert_ack(PendingKey::new(request_id, message_id), now, timeout))
    }

    /// Answer a request whose handler returned [`HandlerResult::Pending`]
    pub fn respond<M: Message>(
        &mut self,
        handle: ResponseHandle,
        message: M,
    ) -> Result<(), MessageError> {
        let mut flags = MessageFlags::REQUEST_RESPONSE;
        if handle.run_original {
            flags |= MessageFlags::RUN_ORIGINAL_ALONGSIDE_REQUEST;
        }
        let container = MessageContainer::new(message);
        self.queue_container(Target::Peer(handle.peer), flags, handle.request_id, &container)
    }

    pub fn take_outgoing(&mut self) -> Vec<OutgoingFrame> {
        self.outgoing.drain(..).collect()
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    // Receiving

    /// Route one received frame. Never fails: faults are logged, contained and
    /// reported through the returned outcome.
    pub fn dispatch(
        &mut self,
        state: &mut S,
        sender: PeerId,
        frame: &[u8],
        now: Instant,
    ) -> DispatchOutcome {
        self.pending.sweep(now);

        let (envelope, payload) = match self.codec.decode(frame) {
            Ok(decoded) => decoded,
            Err(error) => {
                warn!("dropping frame from peer {}: {}", sender, error);
                return DispatchOutcome::Dropped(DropReason::Malformed(error));
            }
        };
        let flags = envelope.flags;
        let key = PendingKey::new(envelope.correlation_key, envelope.message_id);

        // acknowledgements carry a status code, never a message payload
        if flags.contains(MessageFlags::ACKNOWLEDGE_RESPONSE) {
            let error_code = match payload.len() {
                0 => None,
                4 => {
                    let mut bytes = [0u8; 4];
                    bytes.copy_from_slice(payload);
                    Some(StatusCode::from_le_bytes(bytes)).filter(|code| *code != STATUS_OK)
                }
                _ => {
                    let error = MessageError::MalformedFrame {
                        reason: "acknowledgement payload must be empty or a 4 byte status",
                    };
                    warn!("dropping frame from peer {}: {}", sender, error);
                    return DispatchOutcome::Dropped(DropReason::Malformed(error));
                }
            };
            if self.pending.fulfill_ack(key, sender, error_code, now) {
                return DispatchOutcome::Fulfilled;
            }
            trace!(
                "unmatched acknowledgement for request {} from peer {}",
                envelope.correlation_key,
                sender
            );
            return DispatchOutcome::Dropped(DropReason::UnmatchedReply);
        }

        let mut matched = false;
        if flags.contains(MessageFlags::REQUEST_RESPONSE) && envelope.is_correlated() {
            match self.pending.fulfill_response(key, sender, payload, now) {
                Some(Ok(())) => matched = true,
                Some(Err(_)) => {
                    let error = MessageError::MalformedFrame {
                        reason: "response payload does not decode",
                    };
                    warn!("dropping frame from peer {}: {}", sender, error);
                    return DispatchOutcome::Dropped(DropReason::Malformed(error));
                }
                None => {}
            }
        }

        let run_original = flags.contains(MessageFlags::RUN_ORIGINAL_ALONGSIDE_REQUEST);
        if matched && !run_original {
            return DispatchOutcome::Fulfilled;
        }
        if !matched && flags.contains(MessageFlags::REQUEST_RESPONSE) && !run_original {
            debug!(
                "dropping unmatched response {} for request {} from peer {}",
                envelope.message_id, envelope.correlation_key, sender
            );
            return DispatchOutcome::Dropped(DropReason::UnmatchedReply);
        }

        let outcome = self.invoke(state, sender, &envelope, payload, now, matched);

        // the hub forwards relays behind whatever the handler queued, so every
        // peer sees them in the order they were dispatched
        if outcome == DispatchOutcome::Handled
            && self.host_type == HostType::Server
            && flags.contains(MessageFlags::RELAY)
        {
            trace!("relaying message {} from peer {}", envelope.message_id, sender);
            self.outgoing.push_back(OutgoingFrame {
                target: Target::BroadcastExcept(sender),
                frame: frame.into(),
            });
        }
        outcome
    }

    /// Sweep expired requests and send acknowledgements whose deferred status
    /// has become available
    pub fn tick(&mut self, now: Instant) {
        self.pending.sweep(now);

        let mut ready = Vec::new();
        let mut index = 0;
        while index < self.deferred_acks.len() {
            if let Some(status) = self.deferred_acks[index].status.poll() {
                let ack = self.deferred_acks.swap_remove(index);
                ready.push((ack, status));
            } else {
                index += 1;
            }
        }
        for (ack, status) in ready {
            self.queue_ack(ack.peer, ack.message_id, ack.request_id, status);
        }
    }

    /// Resolve every outstanding request as not responded
    pub fn shutdown(&mut self) {
        self.pending.expire_all();
        self.deferred_acks.clear();
    }

    fn invoke(
        &mut self,
        state: &mut S,
        sender: PeerId,
        envelope: &MessageEnvelope,
        payload: &[u8],
        now: Instant,
        fulfilled: bool,
    ) -> DispatchOutcome {
        let host_type = self.host_type;
        let Some(entry) = self.registry.incoming_entry_mut(envelope.message_id, host_type) else {
            let error = MessageError::UnknownMessageId {
                id: envelope.message_id,
            };
            warn!("dropping frame from peer {}: {}", sender, error);
            return DispatchOutcome::Dropped(DropReason::UnknownMessageId(envelope.message_id));
        };
        let handler_name = entry.name;
        let Some(handler) = entry.handler.as_mut() else {
            if fulfilled {
                return DispatchOutcome::Fulfilled;
            }
            debug!(
                "no handler for message {} ({}) from peer {}",
                envelope.message_id, handler_name, sender
            );
            return DispatchOutcome::Dropped(DropReason::UnmatchedReply);
        };

        let mut context = HandlerContext::new(
            host_type,
            sender,
            envelope.message_id,
            envelope.flags,
            envelope.correlation_key,
            now,
        );
        let outcome = catch_unwind(AssertUnwindSafe(|| handler(state, &mut context, payload)));

        let result = match outcome {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(error))) => Err(error.to_string()),
            Ok(Err(_)) => {
                let error = MessageError::MalformedFrame {
                    reason: "payload does not decode as the registered message type",
                };
                warn!(
                    "dropping message {} ({}) from peer {}: {}",
                    envelope.message_id, handler_name, sender, error
                );
                return DispatchOutcome::Dropped(DropReason::Malformed(error));
            }
            Err(panic) => Err(panic_reason(panic)),
        };

        for message in context.take_outbox() {
            self.queue_outgoing(message);
        }

        let flags = envelope.flags;
        match result {
            Ok(result) => {
                self.reply(sender, envelope, result);
                DispatchOutcome::Handled
            }
            Err(reason) => {
                let fault = HandlerFault {
                    handler: handler_name,
                    message_id: envelope.message_id,
                    reason,
                };
                warn!("{}", fault);
                if flags.contains(MessageFlags::ACKNOWLEDGE_REQUEST) {
                    self.queue_ack(
                        sender,
                        envelope.message_id,
                        envelope.correlation_key,
                        STATUS_HANDLER_FAULT,
                    );
                }
                DispatchOutcome::Dropped(DropReason::HandlerFault(fault))
            }
        }
    }

    fn reply(&mut self, sender: PeerId, envelope: &MessageEnvelope, result: HandlerResult) {
        let flags = envelope.flags;
        let request_id = envelope.correlation_key;

        if flags.contains(MessageFlags::REQUEST) {
            let response = match result {
                HandlerResult::Respond(response) => response,
                HandlerResult::Pending => {
                    trace!("request {} will be answered later", request_id);
                    return;
                }
                _ => {
                    warn!(
                        "handler for request {} (message {}) did not respond; the requester will time out",
                        request_id, envelope.message_id
                    );
                    return;
                }
            };
            let mut response_flags = MessageFlags::REQUEST_RESPONSE;
            if flags.contains(MessageFlags::RUN_ORIGINAL_ALONGSIDE_REQUEST) {
                response_flags |= MessageFlags::RUN_ORIGINAL_ALONGSIDE_REQUEST;
            }
            if let Err(error) =
                self.queue_container(Target::Peer(sender), response_flags, request_id, &response)
            {
                warn!("could not send response to request {}: {}", request_id, error);
            }
            return;
        }

        if flags.contains(MessageFlags::ACKNOWLEDGE_REQUEST) {
            match result {
                HandlerResult::Done | HandlerResult::Respond(_) | HandlerResult::Pending => {
                    self.queue_ack(sender, envelope.message_id, request_id, STATUS_OK)
                }
                HandlerResult::Status(status) => {
                    self.queue_ack(sender, envelope.message_id, request_id, status)
                }
                HandlerResult::Deferred(status) => self.deferred_acks.push(PendingAck {
                    peer: sender,
                    message_id: envelope.message_id,
                    request_id,
                    status,
                }),
            }
            return;
        }

        if let HandlerResult::Respond(response) = result {
            debug!(
                "discarding response {} to message {}, which was not a request",
                response.name(),
                envelope.message_id
            );
        }
    }

    fn queue_outgoing(&mut self, message: OutgoingMessage) {
        if let Err(error) = self.queue_container(message.target, message.flags, 0, &message.message) {
            warn!("could not send {} from handler: {}", message.message.name(), error);
        }
    }

    fn queue_container(
        &mut self,
        target: Target,
        flags: MessageFlags,
        correlation_key: RequestId,
        container: &MessageContainer,
    ) -> Result<(), MessageError> {
        let message_id =
            self.registry
                .outgoing_id(container.kind(), container.name(), self.host_type)?;
        let payload = container.to_payload();
        let envelope = MessageEnvelope::keyed(message_id, flags, payload.len() as u32, correlation_key);
        let frame = self.codec.encode(&envelope, &payload)?;
        self.outgoing.push_back(OutgoingFrame { target, frame });
        Ok(())
    }

    fn queue_ack(
        &mut self,
        peer: PeerId,
        message_id: MessageId,
        request_id: RequestId,
        status: StatusCode,
    ) {
        let payload = if status == STATUS_OK {
            Vec::new()
        } else {
            status.to_le_bytes().to_vec()
        };
        let envelope = MessageEnvelope::keyed(
            message_id,
            MessageFlags::ACKNOWLEDGE_RESPONSE,
            payload.len() as u32,
            request_id,
        );
        match self.codec.encode(&envelope, &payload) {
            Ok(frame) => self.outgoing.push_back(OutgoingFrame {
                target: Target::Peer(peer),
                frame,
            }),
            Err(error) => warn!("could not acknowledge request {}: {}", request_id, error),
        }
    }

    fn request_flags(base: MessageFlags, options: &RequestOptions) -> MessageFlags {
        let mut flags = base;
        if options.run_original {
            flags |= MessageFlags::RUN_ORIGINAL_ALONGSIDE_REQUEST;
        }
        if options.relay {
            flags |= MessageFlags::RELAY;
        }
        flags
    }

    fn resolve_timeout(&self, options: &RequestOptions) -> Duration {
        let requested = options
            .timeout
            .unwrap_or(self.config.default_request_timeout);
        clamp_timeout(requested, self.config.max_request_timeout)
    }
}

fn panic_reason(panic: Box<dyn Any + Send>) -> String {
    if let Some(reason) = panic.downcast_ref::<&str>() {
        return (*reason).to_string();
    }
    if let Some(reason) = panic.downcast_ref::<String>() {
        return reason.clone();
    }
    "handler panicked".to_string()
}
