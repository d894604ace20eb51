/// Messages relayed through the server hub
use std::time::Duration;

use tilesync_client::{MessageEvent, RegionAppliedEvent, RegionSentEvent, TransferDiscardedEvent};
use tilesync_shared::{Bounds, PeerId, RegionKind, ResourceClass, ResourceKey, TransferConfig};
use tilesync_test::{
    drain_clients, drain_server, fast_transfer_config, Chat, TestNetwork, TestTerrain,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn relayed_message_reaches_server_and_other_clients() {
    init_logger();
    let mut network = TestNetwork::new(3);
    let author = network.peer(0);

    network.clients[0].relay_message(Chat::new("hello")).unwrap();
    let mut steps = network.run_for(Duration::from_millis(50));

    let at_server = drain_server::<MessageEvent<Chat>, _>(&mut steps);
    assert_eq!(at_server, vec![(author, Chat::new("hello"))]);

    assert!(drain_clients::<MessageEvent<Chat>, _>(&mut steps, 0).is_empty());
    for index in 1..3 {
        let received = drain_clients::<MessageEvent<Chat>, _>(&mut steps, index);
        assert_eq!(received, vec![(PeerId::SERVER, Chat::new("hello"))]);
    }
}

#[test]
fn direct_message_stays_at_server() {
    init_logger();
    let mut network = TestNetwork::new(2);

    network.clients[0].send_message(Chat::new("just you")).unwrap();
    let mut steps = network.run_for(Duration::from_millis(50));

    assert_eq!(drain_server::<MessageEvent<Chat>, _>(&mut steps).len(), 1);
    assert!(drain_clients::<MessageEvent<Chat>, _>(&mut steps, 1).is_empty());
}

#[test]
fn server_broadcast_reaches_every_client() {
    init_logger();
    let mut network = TestNetwork::new(2);

    let second_peer = network.peer(1);
    network.server.broadcast_message(Chat::new("all")).unwrap();
    network
        .server
        .send_message(second_peer, Chat::new("second only"))
        .unwrap();
    let mut steps = network.run_for(Duration::from_millis(50));

    let first: Vec<Chat> = drain_clients::<MessageEvent<Chat>, _>(&mut steps, 0)
        .into_iter()
        .map(|(_, chat)| chat)
        .collect();
    let second: Vec<Chat> = drain_clients::<MessageEvent<Chat>, _>(&mut steps, 1)
        .into_iter()
        .map(|(_, chat)| chat)
        .collect();
    assert_eq!(first, vec![Chat::new("all")]);
    assert_eq!(second, vec![Chat::new("all"), Chat::new("second only")]);
}

#[test]
fn relayed_packets_arrive_after_the_authority_change() {
    init_logger();
    // no pacing: the claim and packet 0 reach the server in the same read
    let transfer = TransferConfig {
        first_packet_delay: Duration::ZERO,
        packet_interval: Duration::ZERO,
        debounce: Duration::ZERO,
        ..fast_transfer_config()
    };
    let mut network = TestNetwork::with_transfer(2, transfer);
    let server_terrain = TestTerrain::new();
    network
        .server
        .register_adapter(ResourceClass::Terrain, Box::new(server_terrain.clone()))
        .unwrap();
    let mut terrains = Vec::new();
    for client in &mut network.clients {
        let terrain = TestTerrain::new();
        client
            .register_adapter(ResourceClass::Terrain, Box::new(terrain.clone()))
            .unwrap();
        terrains.push(terrain);
    }

    let now = network.now;
    let key = ResourceKey::tile(1, 2);
    let bytes: Vec<u8> = (0..400u32).map(|index| (index % 253) as u8).collect();
    network.clients[0]
        .claim_authority(ResourceClass::Terrain, now)
        .unwrap();
    terrains[0].write(key, RegionKind::Heightmap, bytes.clone());
    network.clients[0]
        .invalidate(key, Bounds::from_origin(0, 0, 10, 10), RegionKind::Heightmap, now)
        .unwrap();

    let mut steps = network.run_for(Duration::from_millis(200));

    assert_eq!(drain_clients::<RegionSentEvent, _>(&mut steps, 0).len(), 1);
    assert_eq!(server_terrain.read(key, RegionKind::Heightmap), Some(bytes.clone()));
    assert_eq!(terrains[1].read(key, RegionKind::Heightmap), Some(bytes));
    assert_eq!(drain_clients::<RegionAppliedEvent, _>(&mut steps, 1).len(), 1);
    assert!(drain_clients::<TransferDiscardedEvent, _>(&mut steps, 1).is_empty());
}
