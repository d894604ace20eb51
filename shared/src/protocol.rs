use std::time::Duration;

use crate::{
    context::SyncState,
    messages::{
        direction::MessageDirection,
        error::RegistryError,
        handler::{HandlerContext, HandlerError, HandlerResult, HandlerReturn},
        message::{Message, MessageContainer},
        registry::RpcRegistry,
    },
    sync::resource::ResourceClass,
    types::MessageId,
};

// Protocol Plugin
pub trait ProtocolPlugin {
    fn build(&self, protocol: &mut Protocol);
}

// Protocol
/// Everything both ends must agree on: message ids and resource classes.
/// Built once, then handed to a server or client.
pub struct Protocol {
    /// The duration between each tick
    pub tick_interval: Duration,
    classes: Vec<ResourceClass>,
    registry: RpcRegistry<SyncState>,
    error: Option<RegistryError>,
}

impl Default for Protocol {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(16),
            classes: Vec::new(),
            registry: RpcRegistry::new(),
            error: None,
        }
    }
}

impl Protocol {
    pub fn builder() -> Self {
        Self::default()
    }

    pub fn add_plugin<P: ProtocolPlugin>(&mut self, plugin: P) -> &mut Self {
        plugin.build(self);
        self
    }

    pub fn tick_interval(&mut self, duration: Duration) -> &mut Self {
        self.tick_interval = duration;
        self
    }

    /// Synchronize `class` between peers
    pub fn add_resource_class(&mut self, class: ResourceClass) -> &mut Self {
        if !self.classes.contains(&class) {
            self.classes.push(class);
        }
        self
    }

    pub fn add_all_resource_classes(&mut self) -> &mut Self {
        for class in ResourceClass::ALL {
            self.add_resource_class(class);
        }
        self
    }

    /// Register `M` under `id`. Received messages surface as
    /// `MessageEvent<M>`, or as `RequestEvent<M>` when sent as a request.
    pub fn add_message<M: Message>(&mut self, id: MessageId, direction: MessageDirection) -> &mut Self {
        let result = self.registry.register::<M, _>(id, direction, queue_event::<M>);
        self.record(result)
    }

    /// Register `M` under `id` with a handler that runs on receipt
    pub fn add_handler<M, F>(&mut self, id: MessageId, direction: MessageDirection, handler: F) -> &mut Self
    where
        M: Message,
        F: FnMut(&mut SyncState, &mut HandlerContext, M) -> HandlerReturn + 'static,
    {
        let result = self.registry.register::<M, F>(id, direction, handler);
        self.record(result)
    }

    /// Register a request `Q` and its response `R`. `direction` is the
    /// direction the request travels in; responses travel back. Requests
    /// surface as `RequestEvent<Q>` and are answered through
    /// `SyncContext::respond`.
    pub fn add_request<Q: Message, R: Message>(
        &mut self,
        request_id: MessageId,
        response_id: MessageId,
        direction: MessageDirection,
    ) -> &mut Self {
        let result = self.registry.register::<Q, _>(request_id, direction, queue_event::<Q>);
        self.record(result);
        let result = self.registry.register_codec::<R>(response_id, direction.reverse());
        self.record(result)
    }

    /// Register a request `Q` answered on the spot by `handler`
    pub fn add_request_handler<Q, R, F>(
        &mut self,
        request_id: MessageId,
        response_id: MessageId,
        direction: MessageDirection,
        mut handler: F,
    ) -> &mut Self
    where
        Q: Message,
        R: Message,
        F: FnMut(&mut SyncState, &mut HandlerContext, Q) -> Result<R, HandlerError> + 'static,
    {
        let result = self.registry.register::<Q, _>(
            request_id,
            direction,
            move |state: &mut SyncState, context: &mut HandlerContext, request: Q| {
                handler(state, context, request).map(HandlerResult::respond::<R>)
            },
        );
        self.record(result);
        let result = self.registry.register_codec::<R>(response_id, direction.reverse());
        self.record(result)
    }

    /// Register a response type, or any message that is only ever awaited
    pub fn add_codec<M: Message>(&mut self, id: MessageId, direction: MessageDirection) -> &mut Self {
        let result = self.registry.register_codec::<M>(id, direction);
        self.record(result)
    }

    pub fn classes(&self) -> &[ResourceClass] {
        &self.classes
    }

    /// The first registration error, if any
    pub fn error(&self) -> Option<&RegistryError> {
        self.error.as_ref()
    }

    pub fn build(&mut self) -> Self {
        std::mem::take(self)
    }

    pub(crate) fn into_registry(self) -> Result<(Vec<ResourceClass>, RpcRegistry<SyncState>), RegistryError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Ok((self.classes, self.registry))
    }

    fn record(&mut self, result: Result<(), RegistryError>) -> &mut Self {
        if let Err(error) = result {
            if self.error.is_none() {
                self.error = Some(error);
            }
        }
        self
    }
}

fn queue_event<M: Message>(state: &mut SyncState, context: &mut HandlerContext, message: M) -> HandlerReturn {
    let container = MessageContainer::new(message);
    match context.response_handle() {
        Some(handle) => {
            state.events_mut().push_request(handle, container);
            Ok(HandlerResult::Pending)
        }
        None => {
            state.events_mut().push_message(context.sender(), container);
            Ok(HandlerResult::Done)
        }
    }
}
