use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use log::{trace, warn};
use tokio::sync::oneshot;

use tilesync_serde::{ByteReader, SerdeErr};

use crate::{
    messages::{
        message::Message,
        request::response_future::{
            AckFuture, AckOutcome, RequestOutcome, ResponseContext, ResponseFuture,
        },
    },
    types::{MessageId, PeerId, RequestId, StatusCode},
};

/// Requests are correlated by the id they were issued with and the message id
/// the reply is expected to carry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PendingKey {
    pub request_id: RequestId,
    pub message_id: MessageId,
}

impl PendingKey {
    pub fn new(request_id: RequestId, message_id: MessageId) -> Self {
        Self {
            request_id,
            message_id,
        }
    }
}

trait ResponseSlot {
    fn fulfill(self: Box<Self>, context: ResponseContext, payload: &[u8]) -> Result<(), SerdeErr>;
    fn expire(self: Box<Self>);
    fn is_abandoned(&self) -> bool;
}

struct TypedResponseSlot<R> {
    sender: oneshot::Sender<RequestOutcome<R>>,
}

impl<R: Message> ResponseSlot for TypedResponseSlot<R> {
    fn fulfill(self: Box<Self>, context: ResponseContext, payload: &[u8]) -> Result<(), SerdeErr> {
        let mut reader = ByteReader::new(payload);
        let response = R::de(&mut reader)?;
        if !reader.is_empty() {
            return Err(SerdeErr);
        }
        // the caller may have dropped its future already
        let _ = self.sender.send(RequestOutcome::Responded { context, response });
        Ok(())
    }

    fn expire(self: Box<Self>) {
        let _ = self.sender.send(RequestOutcome::NotResponded);
    }

    fn is_abandoned(&self) -> bool {
        self.sender.is_closed()
    }
}

enum Completion {
    Response(Box<dyn ResponseSlot>),
    Acknowledge(oneshot::Sender<AckOutcome>),
}

struct PendingRequest {
    created_at: Instant,
    timeout: Duration,
    completion: Completion,
}

impl PendingRequest {
    fn expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.timeout
    }

    fn abandoned(&self) -> bool {
        match &self.completion {
            Completion::Response(slot) => slot.is_abandoned(),
            Completion::Acknowledge(sender) => sender.is_closed(),
        }
    }

    fn expire(self) {
        match self.completion {
            Completion::Response(slot) => slot.expire(),
            Completion::Acknowledge(sender) => {
                let _ = sender.send(AckOutcome::not_responded());
            }
        }
    }
}

/// Every outstanding request and acknowledgement of one dispatcher. Each entry
/// is fulfilled exactly once, by a reply or by expiry, and removed either way.
pub struct PendingRequests {
    requests: HashMap<PendingKey, PendingRequest>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self {
            requests: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn contains_request(&self, request_id: RequestId) -> bool {
        self.requests
            .keys()
            .any(|key| key.request_id == request_id)
    }

    pub(crate) fn insert_response<R: Message>(
        &mut self,
        key: PendingKey,
        now: Instant,
        timeout: Duration,
    ) -> ResponseFuture<R> {
        let (sender, receiver) = oneshot::channel();
        self.requests.insert(
            key,
            PendingRequest {
                created_at: now,
                timeout,
                completion: Completion::Response(Box::new(TypedResponseSlot::<R> { sender })),
            },
        );
        ResponseFuture::new(key.request_id, now + timeout, receiver)
    }

    pub(crate) fn insert_ack(&mut self, key: PendingKey, now: Instant, timeout: Duration) -> AckFuture {
        let (sender, receiver) = oneshot::channel();
        self.requests.insert(
            key,
            PendingRequest {
                created_at: now,
                timeout,
                completion: Completion::Acknowledge(sender),
            },
        );
        AckFuture::new(key.request_id, now + timeout, receiver)
    }

    /// Fulfill a pending response. Returns `None` when nothing matching is
    /// pending (never issued, already fulfilled, or expired).
    pub(crate) fn fulfill_response(
        &mut self,
        key: PendingKey,
        sender: PeerId,
        payload: &[u8],
        now: Instant,
    ) -> Option<Result<(), SerdeErr>> {
        if !matches!(
            self.requests.get(&key),
            Some(PendingRequest {
                completion: Completion::Response(_),
                ..
            })
        ) {
            return None;
        }
        let pending = self.requests.remove(&key)?;
        if pending.expired(now) {
            trace!("response for request {} arrived after its timeout", key.request_id);
            pending.expire();
            return None;
        }
        let Completion::Response(slot) = pending.completion else {
            return None;
        };
        let context = ResponseContext {
            sender,
            request_id: key.request_id,
            message_id: key.message_id,
        };
        Some(slot.fulfill(context, payload))
    }

    /// Fulfill a pending acknowledgement. Returns whether one was pending.
    pub(crate) fn fulfill_ack(
        &mut self,
        key: PendingKey,
        sender: PeerId,
        error_code: Option<StatusCode>,
        now: Instant,
    ) -> bool {
        if !matches!(
            self.requests.get(&key),
            Some(PendingRequest {
                completion: Completion::Acknowledge(_),
                ..
            })
        ) {
            return false;
        }
        let Some(pending) = self.requests.remove(&key) else {
            return false;
        };
        if pending.expired(now) {
            trace!("acknowledgement for request {} arrived after its timeout", key.request_id);
            pending.expire();
            return false;
        }
        if let Completion::Acknowledge(ack_sender) = pending.completion {
            let _ = ack_sender.send(AckOutcome::acknowledged(sender, error_code));
        }
        true
    }

    /// Resolve every expired entry as not responded and drop entries whose
    /// future was dropped. Returns how many entries were removed.
    pub(crate) fn sweep(&mut self, now: Instant) -> usize {
        let stale: Vec<PendingKey> = self
            .requests
            .iter()
            .filter(|(_, pending)| pending.expired(now) || pending.abandoned())
            .map(|(key, _)| *key)
            .collect();

        for key in &stale {
            if let Some(pending) = self.requests.remove(key) {
                if pending.expired(now) {
                    trace!("request {} timed out", key.request_id);
                }
                pending.expire();
            }
        }
        stale.len()
    }

    /// Resolve everything as not responded, used at shutdown
    pub(crate) fn expire_all(&mut self) {
        let count = self.requests.len();
        if count > 0 {
            warn!("expiring {} outstanding requests", count);
        }
        for (_, pending) in self.requests.drain() {
            pending.expire();
        }
    }
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}
