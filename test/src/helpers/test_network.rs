use std::time::{Duration, Instant};

use tilesync_client::{Client, ClientConfig};
use tilesync_server::{Server, ServerConfig};
use tilesync_shared::{PeerId, SyncEvent, SyncEvents, TransferConfig};

use crate::{local_network::LocalNetwork, test_protocol::protocol};

/// Pacing short enough that a region crosses the network in a few dozen steps
pub fn fast_transfer_config() -> TransferConfig {
    TransferConfig {
        max_packet_payload: 128,
        first_packet_delay: Duration::from_millis(20),
        packet_interval: Duration::from_millis(10),
        debounce: Duration::from_millis(50),
        force_after: Duration::from_millis(500),
        reorder_grace: Duration::from_millis(50),
        receive_timeout: Duration::from_secs(2),
        ..Default::default()
    }
}

/// What one step produced on each host
pub struct StepEvents {
    pub server: SyncEvents,
    pub clients: Vec<SyncEvents>,
}

/// One server and `n` clients with peer ids `1..=n`, wired through a
/// [`LocalNetwork`] and driven by a simulated clock
pub struct TestNetwork {
    pub network: LocalNetwork,
    pub server: Server,
    pub clients: Vec<Client>,
    pub now: Instant,
    step: Duration,
}

impl TestNetwork {
    pub fn new(client_count: u64) -> Self {
        Self::with_transfer(client_count, fast_transfer_config())
    }

    pub fn with_transfer(client_count: u64, transfer: TransferConfig) -> Self {
        let network = LocalNetwork::new();

        let server_config = ServerConfig {
            transfer: transfer.clone(),
            ..Default::default()
        };
        let mut server = Server::new(server_config, protocol()).expect("server protocol");
        server.listen(network.server_socket());
        let step = server.tick_interval();

        let mut test_network = Self {
            network,
            server,
            clients: Vec::new(),
            now: Instant::now(),
            step,
        };
        for id in 1..=client_count {
            let mut config = ClientConfig::new(PeerId::new(id));
            config.transfer = transfer.clone();
            let client = Client::new(config, protocol()).expect("client protocol");
            test_network.join(client);
        }
        test_network
    }

    /// Connect another client
    pub fn join(&mut self, mut client: Client) {
        let peer = client.peer_id();
        self.server.connect_peer(peer);
        client.connect(self.network.client_socket(peer));
        self.clients.push(client);
    }

    /// Disconnect the client at `index` from the server's side
    pub fn drop_client(&mut self, index: usize) -> Client {
        let client = self.clients.remove(index);
        let peer = client.peer_id();
        self.network.cut(&peer);
        self.server.disconnect_peer(peer, self.now);
        client
    }

    pub fn peer(&self, index: usize) -> PeerId {
        self.clients[index].peer_id()
    }

    /// Advance the clock by one tick and move every queued frame one hop
    pub fn step(&mut self) -> StepEvents {
        self.now += self.step;
        let now = self.now;

        let mut clients = Vec::with_capacity(self.clients.len());
        for client in &mut self.clients {
            let events = client.receive(now);
            client.tick(now);
            client.send_all_packets().expect("client send");
            clients.push(events);
        }

        let server = self.server.receive(now);
        self.server.tick(now);
        self.server.send_all_packets().expect("server send");

        StepEvents { server, clients }
    }

    /// Step until `duration` of simulated time has passed
    pub fn run_for(&mut self, duration: Duration) -> Vec<StepEvents> {
        let until = self.now + duration;
        let mut steps = Vec::new();
        while self.now < until {
            steps.push(self.step());
        }
        steps
    }
}

/// Everything of kind `V` the server reported across `steps`
pub fn drain_server<V, T>(steps: &mut [StepEvents]) -> Vec<T>
where
    V: SyncEvent,
    V::Iter: Iterator<Item = T>,
{
    steps
        .iter_mut()
        .flat_map(|step| step.server.read::<V>())
        .collect()
}

/// Everything of kind `V` the client at `index` reported across `steps`
pub fn drain_clients<V, T>(steps: &mut [StepEvents], index: usize) -> Vec<T>
where
    V: SyncEvent,
    V::Iter: Iterator<Item = T>,
{
    steps
        .iter_mut()
        .filter_map(|step| step.clients.get_mut(index))
        .flat_map(|events| events.read::<V>())
        .collect()
}
