use std::{collections::BTreeMap, mem, time::Instant};

use log::{debug, info, warn};

use crate::{
    authority::{AuthorityChange, AuthorityError, AuthorityState, PeerDirectory},
    connection::ConnectionConfig,
    constants::{AUTHORITY_CHANGE_MESSAGE_ID, TRANSFER_PACKET_MESSAGE_ID},
    error::SyncError,
    messages::{
        direction::MessageDirection,
        codec::FrameCodec,
        dispatcher::{DispatchOutcome, Dispatcher, DropReason, OutgoingFrame, RequestOptions},
        envelope::MessageFlags,
        handler::{HandlerContext, HandlerResult, HandlerReturn, ResponseHandle, Target},
        message::Message,
        request::{AckFuture, ResponseFuture},
    },
    protocol::Protocol,
    sync::{
        adapter::ResourceAdapter,
        dirty_region::RegionId,
        events::SyncEvents,
        resource::{Bounds, RegionKind, ResourceClass, ResourceKey},
        resource_sync::ResourceSync,
        transfer::{TransferConfig, TransferPacket},
    },
    types::{HostType, PeerId},
};

/// State handlers run against: one `ResourceSync` per synchronized class and
/// the events waiting to be read
pub struct SyncState {
    host_type: HostType,
    local_peer: PeerId,
    resources: BTreeMap<ResourceClass, ResourceSync>,
    events: SyncEvents,
}

impl SyncState {
    pub fn host_type(&self) -> HostType {
        self.host_type
    }

    pub fn local_peer(&self) -> PeerId {
        self.local_peer
    }

    pub fn resource(&self, class: ResourceClass) -> Option<&ResourceSync> {
        self.resources.get(&class)
    }

    pub fn events_mut(&mut self) -> &mut SyncEvents {
        &mut self.events
    }

    fn resource_mut(&mut self, class: ResourceClass) -> Result<&mut ResourceSync, AuthorityError> {
        self.resources
            .get_mut(&class)
            .ok_or(AuthorityError::ClassNotRegistered { class })
    }
}

/// One peer's end of the sync protocol, independent of any transport.
///
/// Frames received from the transport go in through [`SyncContext::receive`];
/// [`SyncContext::tick`] advances timers and transfers; encoded frames come
/// out of [`SyncContext::take_outgoing`].
pub struct SyncContext {
    dispatcher: Dispatcher<SyncState>,
    state: SyncState,
}

impl SyncContext {
    pub fn new(
        host_type: HostType,
        local_peer: PeerId,
        protocol: Protocol,
        connection: &ConnectionConfig,
        transfer: &TransferConfig,
    ) -> Result<Self, SyncError> {
        let (classes, mut registry) = protocol.into_registry()?;

        registry.register_internal::<AuthorityChange, _>(
            AUTHORITY_CHANGE_MESSAGE_ID,
            MessageDirection::FromEither,
            handle_authority_change,
        )?;
        registry.register_internal::<TransferPacket, _>(
            TRANSFER_PACKET_MESSAGE_ID,
            MessageDirection::FromEither,
            handle_transfer_packet,
        )?;

        // packets travel unkeyed, behind the base envelope
        let max_message_payload = FrameCodec::from_config(connection).max_payload(false);
        let transfer = transfer.fit_to_frame(max_message_payload)?;
        let resources = classes
            .into_iter()
            .map(|class| (class, ResourceSync::new(class, host_type, local_peer, &transfer)))
            .collect();

        Ok(Self {
            dispatcher: Dispatcher::new(host_type, registry, connection.clone()),
            state: SyncState {
                host_type,
                local_peer,
                resources,
                events: SyncEvents::new(),
            },
        })
    }

    pub fn host_type(&self) -> HostType {
        self.state.host_type
    }

    pub fn local_peer(&self) -> PeerId {
        self.state.local_peer
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn dispatcher(&self) -> &Dispatcher<SyncState> {
        &self.dispatcher
    }

    pub fn resource(&self, class: ResourceClass) -> Option<&ResourceSync> {
        self.state.resource(class)
    }

    pub fn register_adapter(
        &mut self,
        class: ResourceClass,
        adapter: Box<dyn ResourceAdapter>,
    ) -> Result<(), SyncError> {
        self.state.resource_mut(class)?.set_adapter(adapter);
        Ok(())
    }

    pub fn authority_state(&self, class: ResourceClass) -> Option<AuthorityState> {
        self.resource(class).map(|resource| resource.authority().state())
    }

    // Authority

    /// Become the writer for `class`. Applied locally right away; the server
    /// confirms or overrides it.
    pub fn claim_authority(&mut self, class: ResourceClass, now: Instant) -> Result<(), SyncError> {
        let SyncState {
            host_type,
            local_peer,
            resources,
            events,
        } = &mut self.state;
        let resource = resources
            .get_mut(&class)
            .ok_or(AuthorityError::ClassNotRegistered { class })?;
        let transition = resource.authority_mut().claim_local()?;
        resource.apply_transition(transition, now, events);

        match host_type {
            HostType::Server => self
                .dispatcher
                .send(Target::Broadcast, AuthorityChange::new(class, PeerId::SERVER))?,
            HostType::Client => self.dispatcher.send(
                Target::Peer(PeerId::SERVER),
                AuthorityChange::new(class, *local_peer),
            )?,
        }
        Ok(())
    }

    /// Stop writing `class`; the server falls back to holding it
    pub fn release_authority(&mut self, class: ResourceClass, now: Instant) -> Result<(), SyncError> {
        let SyncState {
            host_type,
            resources,
            events,
            ..
        } = &mut self.state;
        let resource = resources
            .get_mut(&class)
            .ok_or(AuthorityError::ClassNotRegistered { class })?;
        let transition = resource.authority_mut().release_local()?;
        resource.apply_transition(transition, now, events);

        let target = match host_type {
            HostType::Server => Target::Broadcast,
            HostType::Client => Target::Peer(PeerId::SERVER),
        };
        self.dispatcher
            .send(target, AuthorityChange::new(class, PeerId::SERVER))?;
        Ok(())
    }

    // Dirty regions

    /// Mark a region as modified. Fails fast when this host is not the writer
    /// of the kind's class.
    pub fn invalidate(
        &mut self,
        key: ResourceKey,
        bounds: Bounds,
        kind: RegionKind,
        now: Instant,
    ) -> Result<RegionId, SyncError> {
        let class = kind.class();
        self.state
            .resource_mut(class)?
            .invalidate(key, bounds, kind, now)
    }

    // Peers

    /// Server side: bring a newly connected peer up to date on who owns what
    pub fn peer_connected(&mut self, peer: PeerId) {
        self.state.events.push_connection(peer);
        if self.state.host_type != HostType::Server {
            return;
        }
        let owners: Vec<(ResourceClass, PeerId)> = self
            .state
            .resources
            .values()
            .filter_map(|resource| {
                let owner = resource.authority().owner()?;
                Some((resource.class(), owner))
            })
            .collect();
        for (class, owner) in owners {
            if let Err(error) = self
                .dispatcher
                .send(Target::Peer(peer), AuthorityChange::new(class, owner))
            {
                warn!("could not send authority of {} to {}: {}", class, peer, error);
            }
        }
    }

    /// Server side: hand authority held by a departed peer back to the server
    pub fn peer_disconnected(&mut self, peer: PeerId, directory: &dyn PeerDirectory, now: Instant) {
        self.state.events.push_disconnection(peer);
        let SyncState {
            resources, events, ..
        } = &mut self.state;
        for resource in resources.values_mut() {
            let Some(transition) = resource.authority_mut().peer_disconnected(peer, directory) else {
                continue;
            };
            resource.apply_transition(transition, now, events);
            if let Err(error) = self.dispatcher.send(
                Target::Broadcast,
                AuthorityChange::new(resource.class(), PeerId::SERVER),
            ) {
                warn!("could not announce fallback authority: {}", error);
            }
        }
    }

    // Messages

    pub fn send<M: Message>(&mut self, target: Target, message: M) -> Result<(), SyncError> {
        Ok(self.dispatcher.send(target, message)?)
    }

    /// Send through the server to every other peer
    pub fn relay<M: Message>(&mut self, message: M) -> Result<(), SyncError> {
        Ok(self
            .dispatcher
            .send_with_flags(Target::Broadcast, MessageFlags::RELAY, message)?)
    }

    pub fn request<Q: Message, R: Message>(
        &mut self,
        target: Target,
        message: Q,
        options: RequestOptions,
        now: Instant,
    ) -> Result<ResponseFuture<R>, SyncError> {
        Ok(self.dispatcher.request::<Q, R>(target, message, options, now)?)
    }

    pub fn request_ack<M: Message>(
        &mut self,
        target: Target,
        message: M,
        options: RequestOptions,
        now: Instant,
    ) -> Result<AckFuture, SyncError> {
        Ok(self.dispatcher.request_ack(target, message, options, now)?)
    }

    /// Answer a request read from a `RequestEvent`
    pub fn respond<R: Message>(&mut self, handle: ResponseHandle, response: R) -> Result<(), SyncError> {
        Ok(self.dispatcher.respond(handle, response)?)
    }

    // Driving

    /// Route one frame received from `sender`
    pub fn receive(&mut self, sender: PeerId, frame: &[u8], now: Instant) -> DispatchOutcome {
        let outcome = self.dispatcher.dispatch(&mut self.state, sender, frame, now);
        match &outcome {
            DispatchOutcome::Dropped(DropReason::Malformed(error)) => {
                self.state.events.push_error(error.clone().into());
            }
            DispatchOutcome::Dropped(DropReason::HandlerFault(fault)) => {
                self.state.events.push_error(fault.clone().into());
            }
            _ => {}
        }
        outcome
    }

    /// Advance request deadlines, reassembly deadlines and outgoing transfers.
    /// Each class emits at most one packet per tick.
    pub fn tick(&mut self, now: Instant) {
        self.dispatcher.tick(now);

        let SyncState {
            host_type,
            resources,
            events,
            ..
        } = &mut self.state;
        let flags = match host_type {
            HostType::Server => MessageFlags::NONE,
            HostType::Client => MessageFlags::RELAY,
        };
        let dispatcher = &mut self.dispatcher;
        for resource in resources.values_mut() {
            resource.tick(now, events);
            resource.poll_outgoing(now, events, |packet| {
                Ok(dispatcher.send_with_flags(Target::Broadcast, flags, packet)?)
            });
        }
    }

    pub fn take_outgoing(&mut self) -> Vec<OutgoingFrame> {
        self.dispatcher.take_outgoing()
    }

    pub fn has_outgoing(&self) -> bool {
        self.dispatcher.has_outgoing()
    }

    pub fn events_mut(&mut self) -> &mut SyncEvents {
        &mut self.state.events
    }

    pub fn take_events(&mut self) -> SyncEvents {
        mem::take(&mut self.state.events)
    }

    pub fn push_error(&mut self, error: SyncError) {
        self.state.events.push_error(error);
    }

    /// Resolve every outstanding request as not responded
    pub fn shutdown(&mut self) {
        self.dispatcher.shutdown();
    }
}

fn handle_authority_change(
    state: &mut SyncState,
    context: &mut HandlerContext,
    change: AuthorityChange,
) -> HandlerReturn {
    let sender = context.sender();
    let host_type = state.host_type;
    let SyncState {
        resources, events, ..
    } = state;
    let resource = resources
        .get_mut(&change.class)
        .ok_or(AuthorityError::ClassNotRegistered { class: change.class })?;

    match host_type {
        HostType::Server => {
            // a claim names its sender; a release names the server and must
            // come from the current owner
            let is_claim = change.owner == sender;
            let is_release = change.owner.is_server() && resource.authority().owner() == Some(sender);
            if !is_claim && !is_release {
                return Err(Box::new(AuthorityError::InvalidTransition {
                    class: change.class,
                    operation: "change authority on behalf of another peer",
                    current_state: resource.authority().state().name(),
                }));
            }
            info!(
                "{} {} authority for {}",
                sender,
                if is_claim { "claimed" } else { "released" },
                change.class
            );
            let transition = resource
                .authority_mut()
                .receive_authority_change(change.owner);
            resource.apply_transition(transition, context.received_at(), events);
            context.broadcast(change);
        }
        HostType::Client => {
            if !sender.is_server() {
                return Err(Box::new(AuthorityError::InvalidTransition {
                    class: change.class,
                    operation: "accept authority changes from a peer other than the server",
                    current_state: resource.authority().state().name(),
                }));
            }
            let transition = resource
                .authority_mut()
                .receive_authority_change(change.owner);
            resource.apply_transition(transition, context.received_at(), events);
        }
    }
    Ok(HandlerResult::Done)
}

fn handle_transfer_packet(
    state: &mut SyncState,
    context: &mut HandlerContext,
    packet: TransferPacket,
) -> HandlerReturn {
    let sender = context.sender();
    let host_type = state.host_type;
    let SyncState {
        resources, events, ..
    } = state;
    let resource = resources
        .get_mut(&packet.class)
        .ok_or(AuthorityError::ClassNotRegistered { class: packet.class })?;

    let from_writer = match host_type {
        HostType::Server => resource.authority().owner() == Some(sender),
        HostType::Client => sender.is_server(),
    };
    if !from_writer {
        debug!(
            "rejecting packet {} of session {} for {} from {}",
            packet.packet_id, packet.session, packet.class, sender
        );
        return Err(Box::new(AuthorityError::AuthorityConflict {
            class: packet.class,
            owner: resource.authority().state().name(),
        }));
    }
    resource.receive_packet(packet, context.received_at(), events);
    Ok(HandlerResult::Done)
}
