use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use smol::{
    channel,
    channel::{Receiver, Sender, TryRecvError},
};

use tilesync_shared::PeerId;

use super::{
    PacketReceiver as TransportReceiver, PacketSender as TransportSender, RecvError, SendError,
    Socket,
};

type Routes = Arc<RwLock<HashMap<PeerId, Sender<Box<[u8]>>>>>;

/// An in-process server socket built on unbounded channels. Peers are
/// attached with [`ChannelSocket::attach`] and hold the other end.
#[derive(Clone)]
pub struct ChannelSocket {
    inbound_sender: Sender<(PeerId, Box<[u8]>)>,
    inbound_receiver: Receiver<(PeerId, Box<[u8]>)>,
    routes: Routes,
}

/// A peer's end of a [`ChannelSocket`]
pub struct PeerLink {
    pub peer: PeerId,
    pub to_server: Sender<(PeerId, Box<[u8]>)>,
    pub from_server: Receiver<Box<[u8]>>,
}

impl ChannelSocket {
    pub fn new() -> Self {
        let (inbound_sender, inbound_receiver) = channel::unbounded();
        Self {
            inbound_sender,
            inbound_receiver,
            routes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Open a route to `peer`. Attaching an already attached peer replaces
    /// its route.
    pub fn attach(&self, peer: PeerId) -> PeerLink {
        let (outbound_sender, outbound_receiver) = channel::unbounded();
        if let Ok(mut routes) = self.routes.write() {
            routes.insert(peer, outbound_sender);
        }
        PeerLink {
            peer,
            to_server: self.inbound_sender.clone(),
            from_server: outbound_receiver,
        }
    }

    pub fn detach(&self, peer: &PeerId) {
        if let Ok(mut routes) = self.routes.write() {
            routes.remove(peer);
        }
    }
}

impl Default for ChannelSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl Socket for ChannelSocket {
    fn listen(self: Box<Self>) -> (Box<dyn TransportSender>, Box<dyn TransportReceiver>) {
        let sender = ChannelSender {
            routes: self.routes.clone(),
        };
        let receiver = ChannelReceiver::new(self.inbound_receiver.clone());
        (Box::new(sender), Box::new(receiver))
    }
}

impl From<ChannelSocket> for Box<dyn Socket> {
    fn from(socket: ChannelSocket) -> Self {
        Box::new(socket)
    }
}

struct ChannelSender {
    routes: Routes,
}

impl TransportSender for ChannelSender {
    fn send(&self, peer: &PeerId, payload: &[u8]) -> Result<(), SendError> {
        let routes = self.routes.read().map_err(|_| SendError)?;
        let route = routes.get(peer).ok_or(SendError)?;
        route.send_blocking(payload.into()).map_err(|_| SendError)
    }
}

struct ChannelReceiver {
    receiver: Receiver<(PeerId, Box<[u8]>)>,
    current_payload: Option<Box<[u8]>>,
}

impl ChannelReceiver {
    fn new(receiver: Receiver<(PeerId, Box<[u8]>)>) -> Self {
        Self {
            receiver,
            current_payload: None,
        }
    }
}

impl TransportReceiver for ChannelReceiver {
    /// Receives a frame from an attached peer
    fn receive(&mut self) -> Result<Option<(PeerId, &[u8])>, RecvError> {
        match self.receiver.try_recv() {
            Ok((peer, payload)) => {
                let payload: &[u8] = self.current_payload.insert(payload);
                Ok(Some((peer, payload)))
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Closed) => Err(RecvError),
        }
    }
}
