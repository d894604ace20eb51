use std::time::{Duration, Instant};

use log::{debug, info, warn};

use tilesync_shared::{
    AckFuture, AuthorityState, Bounds, DispatchOutcome, HostType, Message, OutgoingFrame, PeerId,
    Protocol, RegionId, RegionKind, RequestOptions, ResourceAdapter, ResourceClass, ResourceKey,
    ResourceSync, ResponseFuture, ResponseHandle, SyncContext, SyncEvents, Target, Timer,
};

use crate::{
    client::ClientConfig,
    transport::{PacketReceiver, PacketSender, Socket},
    TileSyncClientError,
};

/// An editing peer. Talks only to the server: claims authority over the
/// classes it edits and streams its dirty regions through the server to
/// everyone else.
pub struct Client {
    config: ClientConfig,
    context: SyncContext,
    io: Option<(Box<dyn PacketSender>, Box<dyn PacketReceiver>)>,
    tick_timer: Timer,
}

impl Client {
    /// Create a new Client
    pub fn new(config: ClientConfig, protocol: Protocol) -> Result<Self, TileSyncClientError> {
        let tick_interval = protocol.tick_interval;
        let context = SyncContext::new(
            HostType::Client,
            config.peer_id,
            protocol,
            &config.connection,
            &config.transfer,
        )?;

        Ok(Self {
            config,
            context,
            io: None,
            tick_timer: Timer::new(tick_interval),
        })
    }

    /// Connect to the server through the given socket
    pub fn connect<S: Into<Box<dyn Socket>>>(&mut self, socket: S) {
        if self.io.is_some() {
            warn!("client is already connected, ignoring connect");
            return;
        }
        let boxed_socket: Box<dyn Socket> = socket.into();
        self.io = Some(boxed_socket.connect());
        info!("{} connected", self.config.peer_id);
        self.context.peer_connected(PeerId::SERVER);
    }

    pub fn is_connected(&self) -> bool {
        self.io
            .as_ref()
            .map(|(sender, _)| sender.connected())
            .unwrap_or(false)
    }

    /// Drop the socket. Outstanding requests resolve as not responded.
    pub fn disconnect(&mut self) -> Result<(), TileSyncClientError> {
        if self.io.take().is_none() {
            return Err(TileSyncClientError::NotConnected);
        }
        info!("{} disconnected", self.config.peer_id);
        self.context.shutdown();
        self.context.events_mut().push_disconnection(PeerId::SERVER);
        Ok(())
    }

    pub fn peer_id(&self) -> PeerId {
        self.config.peer_id
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn context(&self) -> &SyncContext {
        &self.context
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_timer.duration()
    }

    // Updates

    /// Must be called regularly. Reads every frame the server sent and
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

    /// Hand every queued frame to the socket. Everything goes to the server;
    /// frames addressed to another peer must travel as relays.
    pub fn send_all_packets(&mut self) -> Result<(), TileSyncClientError> {
        let frames = self.context.take_outgoing();
        let Some((sender, _)) = self.io.as_ref() else {
            if frames.is_empty() {
                return Ok(());
            }
            return Err(TileSyncClientError::NotConnected);
        };

        let mut result = Ok(());
        for OutgoingFrame { target, frame } in frames {
            if let Target::Peer(peer) = target {
                if !peer.is_server() {
                    warn!("clients only reach {} through a relay, frame dropped", peer);
                    continue;
                }
            }
            if sender.send(&frame).is_err() {
                warn!("could not send a frame to the server");
                result = Err(TileSyncClientError::SendError);
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
                Ok(Some(frame)) => {
                    if let DispatchOutcome::Dropped(reason) =
                        self.context.receive(PeerId::SERVER, frame, now)
                    {
                        debug!("frame from server dropped: {:?}", reason);
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    warn!("client socket failed while receiving");
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
    ) -> Result<(), TileSyncClientError> {
        Ok(self.context.register_adapter(class, adapter)?)
    }

    pub fn resource(&self, class: ResourceClass) -> Option<&ResourceSync> {
        self.context.resource(class)
    }

    pub fn authority_state(&self, class: ResourceClass) -> Option<AuthorityState> {
        self.context.authority_state(class)
    }

    /// Become the writer of `class`. Applied right away; the server confirms
    /// or overrides it.
    pub fn claim_authority(
        &mut self,
        class: ResourceClass,
        now: Instant,
    ) -> Result<(), TileSyncClientError> {
        Ok(self.context.claim_authority(class, now)?)
    }

    pub fn release_authority(
        &mut self,
        class: ResourceClass,
        now: Instant,
    ) -> Result<(), TileSyncClientError> {
        Ok(self.context.release_authority(class, now)?)
    }

    pub fn invalidate(
        &mut self,
        key: ResourceKey,
        bounds: Bounds,
        kind: RegionKind,
        now: Instant,
    ) -> Result<RegionId, TileSyncClientError> {
        Ok(self.context.invalidate(key, bounds, kind, now)?)
    }

    // Messages

    /// Queues up a Message to be sent to the server
    pub fn send_message<M: Message>(&mut self, message: M) -> Result<(), TileSyncClientError> {
        Ok(self.context.send(Target::Peer(PeerId::SERVER), message)?)
    }

    /// Queues up a Message the server forwards to every other peer
    pub fn relay_message<M: Message>(&mut self, message: M) -> Result<(), TileSyncClientError> {
        Ok(self.context.relay(message)?)
    }

    pub fn send_request<Q: Message, R: Message>(
        &mut self,
        request: Q,
        options: RequestOptions,
        now: Instant,
    ) -> Result<ResponseFuture<R>, TileSyncClientError> {
        Ok(self
            .context
            .request::<Q, R>(Target::Peer(PeerId::SERVER), request, options, now)?)
    }

    pub fn send_request_ack<M: Message>(
        &mut self,
        message: M,
        options: RequestOptions,
        now: Instant,
    ) -> Result<AckFuture, TileSyncClientError> {
        Ok(self
            .context
            .request_ack(Target::Peer(PeerId::SERVER), message, options, now)?)
    }

    /// Answer a request read from a `RequestEvent`
    pub fn send_response<R: Message>(
        &mut self,
        handle: ResponseHandle,
        response: R,
    ) -> Result<(), TileSyncClientError> {
        Ok(self.context.respond(handle, response)?)
    }
}
