/// In-memory network for end-to-end tests.
/// Routes frames between one server and any number of clients without I/O.
use tilesync_client::transport::ChannelSocket as ClientSocket;
use tilesync_server::transport::ChannelSocket as ServerSocket;
use tilesync_shared::PeerId;

pub struct LocalNetwork {
    socket: ServerSocket,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self {
            socket: ServerSocket::new(),
        }
    }

    /// The server's end. Every clone shares the same routes.
    pub fn server_socket(&self) -> ServerSocket {
        self.socket.clone()
    }

    /// A fresh client end for `peer`, replacing any earlier one
    pub fn client_socket(&self, peer: PeerId) -> ClientSocket {
        let link = self.socket.attach(peer);
        ClientSocket::new(link.peer, link.to_server, link.from_server)
    }

    /// Stop delivering frames to `peer`
    pub fn cut(&self, peer: &PeerId) {
        self.socket.detach(peer);
    }
}

impl Default for LocalNetwork {
    fn default() -> Self {
        Self::new()
    }
}
