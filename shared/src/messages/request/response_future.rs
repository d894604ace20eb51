use std::time::Instant;

use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::types::{MessageId, PeerId, RequestId, StatusCode};

/// Where a response came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResponseContext {
    pub sender: PeerId,
    pub request_id: RequestId,
    pub message_id: MessageId,
}

/// Result of a request. Not hearing back is a normal value, not an error.
#[derive(Debug, PartialEq)]
pub enum RequestOutcome<R> {
    Responded {
        context: ResponseContext,
        response: R,
    },
    NotResponded,
}

impl<R> RequestOutcome<R> {
    pub fn is_responded(&self) -> bool {
        matches!(self, RequestOutcome::Responded { .. })
    }

    pub fn into_response(self) -> Option<R> {
        match self {
            RequestOutcome::Responded { response, .. } => Some(response),
            RequestOutcome::NotResponded => None,
        }
    }
}

/// Result of an acknowledged send
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AckOutcome {
    pub responded: bool,
    pub sender: Option<PeerId>,
    /// Set when the remote handler reported a non-zero status
    pub error_code: Option<StatusCode>,
}

impl AckOutcome {
    pub fn not_responded() -> Self {
        Self {
            responded: false,
            sender: None,
            error_code: None,
        }
    }

    pub fn acknowledged(sender: PeerId, error_code: Option<StatusCode>) -> Self {
        Self {
            responded: true,
            sender: Some(sender),
            error_code,
        }
    }

    pub fn is_success(&self) -> bool {
        self.responded && self.error_code.is_none()
    }
}

/// Awaitable handle for one outstanding request.
///
/// The simulation tick can poll it with [`ResponseFuture::try_take`]; async
/// callers can [`ResponseFuture::wait`] on it, which suspends only the calling
/// task while the dispatcher keeps processing frames.
pub struct ResponseFuture<R> {
    request_id: RequestId,
    deadline: Instant,
    receiver: oneshot::Receiver<RequestOutcome<R>>,
}

impl<R> ResponseFuture<R> {
    pub(crate) fn new(
        request_id: RequestId,
        deadline: Instant,
        receiver: oneshot::Receiver<RequestOutcome<R>>,
    ) -> Self {
        Self {
            request_id,
            deadline,
            receiver,
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Non-blocking check. `None` while the request is still outstanding.
    pub fn try_take(&mut self) -> Option<RequestOutcome<R>> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(RequestOutcome::NotResponded),
        }
    }

    pub async fn wait(self) -> RequestOutcome<R> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, self.receiver).await {
            Ok(Ok(outcome)) => outcome,
            _ => RequestOutcome::NotResponded,
        }
    }
}

/// Awaitable handle for one outstanding acknowledgement
pub struct AckFuture {
    request_id: RequestId,
    deadline: Instant,
    receiver: oneshot::Receiver<AckOutcome>,
}

impl AckFuture {
    pub(crate) fn new(
        request_id: RequestId,
        deadline: Instant,
        receiver: oneshot::Receiver<AckOutcome>,
    ) -> Self {
        Self {
            request_id,
            deadline,
            receiver,
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn try_take(&mut self) -> Option<AckOutcome> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(AckOutcome::not_responded()),
        }
    }

    pub async fn wait(self) -> AckOutcome {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, self.receiver).await {
            Ok(Ok(outcome)) => outcome,
            _ => AckOutcome::not_responded(),
        }
    }
}
