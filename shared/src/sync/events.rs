use std::{any::TypeId, collections::HashMap, marker::PhantomData, mem, vec::IntoIter};

use crate::{
    authority::AuthorityState,
    error::SyncError,
    messages::{
        handler::ResponseHandle,
        message::{Message, MessageContainer},
    },
    sync::{
        resource::{Bounds, RegionKind, ResourceClass, ResourceKey},
        transfer::TransferError,
    },
    types::{PeerId, SessionId},
};

/// Authority over a class moved
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthorityChanged {
    pub class: ResourceClass,
    pub previous: AuthorityState,
    pub current: AuthorityState,
}

/// The last packet of a region went out
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionSent {
    pub class: ResourceClass,
    pub session: SessionId,
    pub key: ResourceKey,
    pub kind: RegionKind,
    pub bounds: Bounds,
}

/// A received region was handed to the adapter
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionApplied {
    pub class: ResourceClass,
    pub session: SessionId,
    pub key: ResourceKey,
    pub kind: RegionKind,
    pub bounds: Bounds,
    /// Length of the snapshot after decompression
    pub raw_length: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferDiscarded {
    pub class: ResourceClass,
    pub session: SessionId,
    pub error: TransferError,
}

/// Everything that happened since the events were last drained
pub struct SyncEvents {
    connections: Vec<PeerId>,
    disconnections: Vec<PeerId>,
    authority_changes: Vec<AuthorityChanged>,
    regions_sent: Vec<RegionSent>,
    regions_applied: Vec<RegionApplied>,
    discarded: Vec<TransferDiscarded>,
    messages: HashMap<TypeId, Vec<(PeerId, MessageContainer)>>,
    requests: HashMap<TypeId, Vec<(ResponseHandle, MessageContainer)>>,
    errors: Vec<SyncError>,

    empty: bool,
}

impl SyncEvents {
    pub fn new() -> Self {
        Self {
            connections: Vec::new(),
            disconnections: Vec::new(),
            authority_changes: Vec::new(),
            regions_sent: Vec::new(),
            regions_applied: Vec::new(),
            discarded: Vec::new(),
            messages: HashMap::new(),
            requests: HashMap::new(),
            errors: Vec::new(),

            empty: true,
        }
    }

    // Public

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn read<V: SyncEvent>(&mut self) -> V::Iter {
        V::iter(self)
    }

    pub fn has<V: SyncEvent>(&self) -> bool {
        V::has(self)
    }

    /// Used by the server and client to report their transport's peers
    pub fn push_connection(&mut self, peer: PeerId) {
        self.connections.push(peer);
        self.empty = false;
    }

    pub fn push_disconnection(&mut self, peer: PeerId) {
        self.disconnections.push(peer);
        self.empty = false;
    }

    pub fn push_error(&mut self, error: SyncError) {
        self.errors.push(error);
        self.empty = false;
    }

    // Crate-public

    pub(crate) fn push_authority_change(&mut self, change: AuthorityChanged) {
        self.authority_changes.push(change);
        self.empty = false;
    }

    pub(crate) fn push_region_sent(&mut self, sent: RegionSent) {
        self.regions_sent.push(sent);
        self.empty = false;
    }

    pub(crate) fn push_region_applied(&mut self, applied: RegionApplied) {
        self.regions_applied.push(applied);
        self.empty = false;
    }

    pub(crate) fn push_discarded(&mut self, discarded: TransferDiscarded) {
        self.discarded.push(discarded);
        self.empty = false;
    }

    pub(crate) fn push_message(&mut self, sender: PeerId, message: MessageContainer) {
        self.messages
            .entry(message.kind())
            .or_default()
            .push((sender, message));
        self.empty = false;
    }

    pub(crate) fn push_request(&mut self, handle: ResponseHandle, message: MessageContainer) {
        self.requests
            .entry(message.kind())
            .or_default()
            .push((handle, message));
        self.empty = false;
    }
}

impl Default for SyncEvents {
    fn default() -> Self {
        Self::new()
    }
}

// Event Trait
pub trait SyncEvent {
    type Iter;

    fn iter(events: &mut SyncEvents) -> Self::Iter;

    fn has(events: &SyncEvents) -> bool;
}

macro_rules! list_event {
    ($event:ident, $field:ident, $item:ty) => {
        pub struct $event;
        impl SyncEvent for $event {
            type Iter = IntoIter<$item>;

            fn iter(events: &mut SyncEvents) -> Self::Iter {
                IntoIterator::into_iter(mem::take(&mut events.$field))
            }

            fn has(events: &SyncEvents) -> bool {
                !events.$field.is_empty()
            }
        }
    };
}

list_event!(ConnectEvent, connections, PeerId);
list_event!(DisconnectEvent, disconnections, PeerId);
list_event!(AuthorityChangedEvent, authority_changes, AuthorityChanged);
list_event!(RegionSentEvent, regions_sent, RegionSent);
list_event!(RegionAppliedEvent, regions_applied, RegionApplied);
list_event!(TransferDiscardedEvent, discarded, TransferDiscarded);
list_event!(ErrorEvent, errors, SyncError);

fn read_messages<K, M: Message>(messages: Vec<(K, MessageContainer)>) -> Vec<(K, M)> {
    messages
        .into_iter()
        .filter_map(|(key, container)| container.downcast::<M>().map(|message| (key, message)))
        .collect()
}

// MessageEvent
pub struct MessageEvent<M: Message> {
    phantom_m: PhantomData<M>,
}
impl<M: Message> SyncEvent for MessageEvent<M> {
    type Iter = IntoIter<(PeerId, M)>;

    fn iter(events: &mut SyncEvents) -> Self::Iter {
        let messages = events
            .messages
            .remove(&TypeId::of::<M>())
            .unwrap_or_default();
        IntoIterator::into_iter(read_messages(messages))
    }

    fn has(events: &SyncEvents) -> bool {
        events.messages.contains_key(&TypeId::of::<M>())
    }
}

// RequestEvent
/// Requests left for the application to answer through
/// `SyncContext::respond`
pub struct RequestEvent<M: Message> {
    phantom_m: PhantomData<M>,
}
impl<M: Message> SyncEvent for RequestEvent<M> {
    type Iter = IntoIter<(ResponseHandle, M)>;

    fn iter(events: &mut SyncEvents) -> Self::Iter {
        let requests = events
            .requests
            .remove(&TypeId::of::<M>())
            .unwrap_or_default();
        IntoIterator::into_iter(read_messages(requests))
    }

    fn has(events: &SyncEvents) -> bool {
        events.requests.contains_key(&TypeId::of::<M>())
    }
}
