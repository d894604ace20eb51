mod channel;

pub use channel::{ChannelSocket, PeerLink};
pub use inner::{PacketReceiver, PacketSender, RecvError, SendError, Socket};

mod inner {

    use tilesync_shared::PeerId;

    pub struct SendError;

    pub struct RecvError;

    pub trait Socket {
        fn listen(self: Box<Self>) -> (Box<dyn PacketSender>, Box<dyn PacketReceiver>);
    }

    /// Used to send frames to connected peers
    pub trait PacketSender: Send + Sync {
        /// Sends a frame to the given peer
        fn send(&self, peer: &PeerId, payload: &[u8]) -> Result<(), SendError>;
    }

    /// Used to receive frames from connected peers
    pub trait PacketReceiver: Send + Sync {
        /// Receives the next frame and the peer that sent it, if any
        fn receive(&mut self) -> Result<Option<(PeerId, &[u8])>, RecvError>;
    }
}
