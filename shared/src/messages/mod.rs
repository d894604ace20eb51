pub mod codec;
pub mod direction;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod message;
pub mod registry;
pub mod request;

pub use codec::FrameCodec;
pub use direction::MessageDirection;
pub use dispatcher::{DispatchOutcome, Dispatcher, DropReason, OutgoingFrame, RequestOptions};
pub use envelope::{MessageEnvelope, MessageFlags};
pub use error::{HandlerFault, MessageError, RegistryError};
pub use handler::{
    DeferredStatus, HandlerContext, HandlerError, HandlerResult, HandlerReturn, ResponseHandle,
    StatusCompleter, Target,
};
pub use message::{Message, MessageContainer};
pub use registry::RpcRegistry;
