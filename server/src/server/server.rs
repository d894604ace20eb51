use std::time::{Duration, Instant};

use log::{debug, info, warn};

use tilesync_shared::{
    AckFuture, AuthorityState, Bounds, DispatchOutcome, HostType, Message, OutgoingFrame,
    PeerDirectory, PeerId, Protocol, RegionId, RegionKind, RequestOptions, ResourceAdapter,
    ResourceClass, ResourceKey, ResourceSync, ResponseFuture, ResponseHandle, SyncContext,
    SyncEvents, Target, Timer,
};

use crate::{
    server::{PeerRegistry, ServerConfig},
    transport::{PacketReceiver, PacketSender, Socket},
    TileSyncServerError,
};

/// The hub of a tilesync session. Every client talks only to the server;
/// the server arbitrates authority, forwards `RELAY` frames to the other
/// peers and streams its own dirty regions to everyone.
pub struct Server {
    config: ServerConfig,
    context: SyncContext,
    io: Option<(Box<dyn PacketSender>, Box<dyn PacketReceiver>)>,
    peers: PeerRegistry,
    tick_timer: Timer,
}

impl Server {
    /// Create a new Server
    pub fn new(config: ServerConfig, protocol: Protocol) -> Result<Self, TileSyncServerError> {
        let tick_interval = protocol.tick_interval;
        let context = SyncContext::new(
            HostType::Server,
            PeerId::SERVER,
            protocol,
            &config.connection,
            &config.transfer,
        )?;

        Ok(Self {
            config,
            context,
            io: None,
            peers: PeerRegistry::new(),
            tick_timer: Timer::new(tick_interval),
        })
    }

    /// Listen on the given socket
    pub fn listen<S: Into<Box<dyn Socket>>>(&mut self, socket: S) {
        let boxed_socket: Box<dyn Socket> = socket.into();
        self.io = Some(boxed_socket.listen());
    }

    /// Returns whether or not the Server has a socket to talk through
    pub fn is_listening(&self) -> bool {
        self.io.is_some()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn context(&self) -> &SyncContext {
        &self.context
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_timer.duration()
    }

    // Peers

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    /// Start serving `peer`. The peer is told who currently owns each class.
    pub fn connect_peer(&mut self, peer: PeerId) -> bool {
        if peer.is_server() {
            warn!("refusing to connect a peer using the server id");
            return false;
        }
        if !self.peers.insert(peer) {
            return false;
        }
        info!("{} connected", peer);
        self.context.peer_connected(peer);
        true
    }

    /// Stop serving `peer`. Authority it held falls back to the server.
    pub fn disconnect_peer(&mut self, peer: PeerId, now: Instant) -> bool {
        if !self.peers.remove(&peer) {
            return false;
        }
        info!("{} disconnected", peer);
        self.context.peer_disconnected(peer, &self.peers, now);
        true
    }

    // Updates

    /// Must be called regularly. Reads every frame waiting in the socket and
    /// returns everything that happened since the last call.
    pub fn receive(&mut self, now: Instant) -> SyncEvents {
        self.read_socket(now);
        self.context.take_events()
    }

    /// Advance the simulation when a tick is due. Returns whether it ran.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.tick_timer.ringing(now) {
            return false;
        }
        self.tick_timer.reset(now);
        self.context.tick(now);
        true
    }

    /// Hand every queued frame to the socket
    pub fn send_all_packets(&mut self) -> Result<(), TileSyncServerError> {
        let frames = self.context.take_outgoing();
        let Some((sender, _)) = self.io.as_ref() else {
            if frames.is_empty() {
                return Ok(());
            }
            return Err(TileSyncServerError::NotListening);
        };

        let mut result = Ok(());
        for OutgoingFrame { target, frame } in frames {
            for peer in resolve_target(&self.peers, target) {
                if sender.send(&peer, &frame).is_err() {
                    warn!("could not send a frame to {}", peer);
                    result = Err(TileSyncServerError::SendError { peer });
                }
            }
        }
        result
    }

    fn read_socket(&mut self, now: Instant) {
        let Some((_, receiver)) = self.io.as_mut() else {
            return;
        };

        loop {
            match receiver.receive() {
                Ok(Some((peer, frame))) => {
                    if !self.peers.is_connected(&peer) {
                        warn!("dropping a frame from unknown peer {}", peer);
                        continue;
                    }
                    // relays are queued by the context, in dispatch order
                    if let DispatchOutcome::Dropped(reason) = self.context.receive(peer, frame, now) {
                        debug!("frame from {} dropped: {:?}", peer, reason);
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    warn!("server socket failed while receiving");
                    break;
                }
            }
        }
    }

    // Resources

    pub fn register_adapter(
        &mut self,
        class: ResourceClass,
        adapter: Box<dyn ResourceAdapter>,
    ) -> Result<(), TileSyncServerError> {
        Ok(self.context.register_adapter(class, adapter)?)
    }

    pub fn resource(&self, class: ResourceClass) -> Option<&ResourceSync> {
        self.context.resource(class)
    }

    pub fn authority_state(&self, class: ResourceClass) -> Option<AuthorityState> {
        self.context.authority_state(class)
    }

    /// Take authority over `class` away from whoever holds it
    pub fn claim_authority(
        &mut self,
        class: ResourceClass,
        now: Instant,
    ) -> Result<(), TileSyncServerError> {
        Ok(self.context.claim_authority(class, now)?)
    }

    pub fn release_authority(
        &mut self,
        class: ResourceClass,
        now: Instant,
    ) -> Result<(), TileSyncServerError> {
        Ok(self.context.release_authority(class, now)?)
    }

    pub fn invalidate(
        &mut self,
        key: ResourceKey,
        bounds: Bounds,
        kind: RegionKind,
        now: Instant,
    ) -> Result<RegionId, TileSyncServerError> {
        Ok(self.context.invalidate(key, bounds, kind, now)?)
    }

    // Messages

    /// Queues up a Message to be sent to the given peer
    pub fn send_message<M: Message>(&mut self, peer: PeerId, message: M) -> Result<(), TileSyncServerError> {
        Ok(self.context.send(Target::Peer(peer), message)?)
    }

    /// Queues up a Message to be sent to every connected peer
    pub fn broadcast_message<M: Message>(&mut self, message: M) -> Result<(), TileSyncServerError> {
        Ok(self.context.send(Target::Broadcast, message)?)
    }

    pub fn send_request<Q: Message, R: Message>(
        &mut self,
        peer: PeerId,
        request: Q,
        options: RequestOptions,
        now: Instant,
    ) -> Result<ResponseFuture<R>, TileSyncServerError> {
        Ok(self
            .context
            .request::<Q, R>(Target::Peer(peer), request, options, now)?)
    }

    pub fn send_request_ack<M: Message>(
        &mut self,
        peer: PeerId,
        message: M,
        options: RequestOptions,
        now: Instant,
    ) -> Result<AckFuture, TileSyncServerError> {
        Ok(self
            .context
            .request_ack(Target::Peer(peer), message, options, now)?)
    }

    /// Answer a request read from a `RequestEvent`
    pub fn send_response<R: Message>(
        &mut self,
        handle: ResponseHandle,
        response: R,
    ) -> Result<(), TileSyncServerError> {
        Ok(self.context.respond(handle, response)?)
    }

    /// Resolve every outstanding request and stop talking to the socket
    pub fn shutdown(&mut self) {
        self.context.shutdown();
        self.io = None;
    }
}

fn resolve_target(peers: &PeerRegistry, target: Target) -> Vec<PeerId> {
    match target {
        Target::Peer(peer) => vec![peer],
        Target::Broadcast => peers.current_peers(),
        Target::BroadcastExcept(except) => peers
            .iter()
            .copied()
            .filter(|peer| *peer != except)
            .collect(),
    }
}
