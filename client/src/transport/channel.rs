use smol::channel::{Receiver, Sender, TryRecvError};

use tilesync_shared::PeerId;

use super::{
    PacketReceiver as TransportReceiver, PacketSender as TransportSender, RecvError, SendError,
    Socket,
};

/// An in-process client socket: one channel into the server's shared inbound
/// queue, one channel carrying frames addressed to this peer
pub struct ChannelSocket {
    peer: PeerId,
    to_server: Sender<(PeerId, Box<[u8]>)>,
    from_server: Receiver<Box<[u8]>>,
}

impl ChannelSocket {
    pub fn new(
        peer: PeerId,
        to_server: Sender<(PeerId, Box<[u8]>)>,
        from_server: Receiver<Box<[u8]>>,
    ) -> Self {
        Self {
            peer,
            to_server,
            from_server,
        }
    }
}

impl Socket for ChannelSocket {
    fn connect(self: Box<Self>) -> (Box<dyn TransportSender>, Box<dyn TransportReceiver>) {
        let sender = ChannelSender {
            peer: self.peer,
            sender: self.to_server,
        };
        let receiver = ChannelReceiver {
            receiver: self.from_server,
            current_payload: None,
        };
        (Box::new(sender), Box::new(receiver))
    }
}

impl From<ChannelSocket> for Box<dyn Socket> {
    fn from(socket: ChannelSocket) -> Self {
        Box::new(socket)
    }
}

struct ChannelSender {
    peer: PeerId,
    sender: Sender<(PeerId, Box<[u8]>)>,
}

impl TransportSender for ChannelSender {
    fn send(&self, payload: &[u8]) -> Result<(), SendError> {
        self.sender
            .send_blocking((self.peer, payload.into()))
            .map_err(|_| SendError)
    }

    fn connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

struct ChannelReceiver {
    receiver: Receiver<Box<[u8]>>,
    current_payload: Option<Box<[u8]>>,
}

impl TransportReceiver for ChannelReceiver {
    fn receive(&mut self) -> Result<Option<&[u8]>, RecvError> {
        match self.receiver.try_recv() {
            Ok(payload) => {
                let payload: &[u8] = self.current_payload.insert(payload);
                Ok(Some(payload))
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Closed) => Err(RecvError),
        }
    }
}
