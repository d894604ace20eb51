mod channel;

pub use channel::ChannelSocket;
pub use inner::{PacketReceiver, PacketSender, RecvError, SendError, Socket};

mod inner {

    pub struct SendError;

    pub struct RecvError;

    pub trait Socket {
        fn connect(self: Box<Self>) -> (Box<dyn PacketSender>, Box<dyn PacketReceiver>);
    }

    /// Used to send frames to the server
    pub trait PacketSender: Send + Sync {
        /// Sends a frame to the server
        fn send(&self, payload: &[u8]) -> Result<(), SendError>;
        /// Whether the connection to the server is still open
        fn connected(&self) -> bool;
    }

    /// Used to receive frames from the server
    pub trait PacketReceiver: Send + Sync {
        /// Receives the next frame from the server, if any
        fn receive(&mut self) -> Result<Option<&[u8]>, RecvError>;
    }
}
