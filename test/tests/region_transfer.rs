/// End-to-end dirty-region streaming: a client edits, the server applies and
/// relays, every other client converges on the same bytes
use std::time::Duration;

use tilesync_client::{ErrorEvent, RegionAppliedEvent, RegionSentEvent};
use tilesync_shared::{
    AuthorityState, Bounds, RegionKind, ResourceClass, ResourceKey, SyncError,
    TransferConfig,
};
use tilesync_test::{
    drain_clients, drain_server, fast_transfer_config, TestNavMesh, TestNetwork, TestTerrain,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Terrain adapters for the server and each client, in that order
fn with_terrain(network: &mut TestNetwork) -> (TestTerrain, Vec<TestTerrain>) {
    let server_terrain = TestTerrain::new();
    network
        .server
        .register_adapter(ResourceClass::Terrain, Box::new(server_terrain.clone()))
        .unwrap();
    let mut client_terrains = Vec::new();
    for client in &mut network.clients {
        let terrain = TestTerrain::new();
        client
            .register_adapter(ResourceClass::Terrain, Box::new(terrain.clone()))
            .unwrap();
        client_terrains.push(terrain);
    }
    (server_terrain, client_terrains)
}

fn heightmap(len: usize) -> Vec<u8> {
    (0..len).map(|index| (index * 7 % 251) as u8).collect()
}

#[test]
fn edited_tile_reaches_every_peer() {
    init_logger();
    let mut network = TestNetwork::new(2);
    let (server_terrain, client_terrains) = with_terrain(&mut network);
    let now = network.now;

    let key = ResourceKey::tile(3, 7);
    let bounds = Bounds::from_origin(0, 0, 20, 20);
    let bytes = heightmap(400);

    network.clients[0]
        .claim_authority(ResourceClass::Terrain, now)
        .unwrap();
    client_terrains[0].write(key, RegionKind::Heightmap, bytes.clone());
    network.clients[0]
        .invalidate(key, bounds, RegionKind::Heightmap, now)
        .unwrap();

    let mut steps = network.run_for(Duration::from_millis(500));

    assert_eq!(server_terrain.read(key, RegionKind::Heightmap), Some(bytes.clone()));
    assert_eq!(client_terrains[1].read(key, RegionKind::Heightmap), Some(bytes));
    assert_eq!(
        client_terrains[1].applied(),
        vec![(key, RegionKind::Heightmap, bounds)]
    );

    let sent = drain_clients::<RegionSentEvent, _>(&mut steps, 0);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].key, key);

    let applied = drain_clients::<RegionAppliedEvent, _>(&mut steps, 1);
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].raw_length, 400);

    // the writer never applies its own region
    assert!(client_terrains[0].applied().is_empty());
    assert!(network.clients[0]
        .resource(ResourceClass::Terrain)
        .unwrap()
        .tracker()
        .is_empty());
}

#[test]
fn overlapping_edits_are_sent_once() {
    init_logger();
    let mut network = TestNetwork::new(1);
    let (server_terrain, client_terrains) = with_terrain(&mut network);
    let now = network.now;
    let key = ResourceKey::tile(0, 0);

    network.clients[0]
        .claim_authority(ResourceClass::Terrain, now)
        .unwrap();
    client_terrains[0].write(key, RegionKind::Splatmap, heightmap(64));
    let first = network.clients[0]
        .invalidate(key, Bounds::new(0, 0, 4, 4), RegionKind::Splatmap, now)
        .unwrap();
    let second = network.clients[0]
        .invalidate(key, Bounds::new(3, 3, 8, 8), RegionKind::Splatmap, now)
        .unwrap();
    assert_eq!(first, second);

    network.run_for(Duration::from_millis(300));

    assert_eq!(
        server_terrain.applied(),
        vec![(key, RegionKind::Splatmap, Bounds::new(0, 0, 8, 8))]
    );
}

#[test]
fn server_edits_reach_clients() {
    init_logger();
    let mut network = TestNetwork::new(2);
    let navmeshes: Vec<TestNavMesh> = (0..2).map(|_| TestNavMesh::new()).collect();
    for (client, navmesh) in network.clients.iter_mut().zip(&navmeshes) {
        client
            .register_adapter(ResourceClass::NavMesh, Box::new(navmesh.clone()))
            .unwrap();
    }
    let server_navmesh = TestNavMesh::new();
    network
        .server
        .register_adapter(ResourceClass::NavMesh, Box::new(server_navmesh.clone()))
        .unwrap();

    let now = network.now;
    let key = ResourceKey::tile(-2, 5);
    let indices: Vec<u32> = (0..90).collect();
    network
        .server
        .claim_authority(ResourceClass::NavMesh, now)
        .unwrap();
    server_navmesh.write(key, &indices);
    network
        .server
        .invalidate(key, Bounds::cell(0, 0), RegionKind::NavMeshTile, now)
        .unwrap();

    network.run_for(Duration::from_millis(400));

    for navmesh in &navmeshes {
        assert_eq!(navmesh.read(key), Some(indices.clone()));
    }
}

#[test]
fn invalidating_without_authority_fails_fast() {
    init_logger();
    let mut network = TestNetwork::new(1);
    let now = network.now;

    let result = network.clients[0].invalidate(
        ResourceKey::tile(1, 1),
        Bounds::cell(0, 0),
        RegionKind::Holes,
        now,
    );
    assert!(result.is_err());
    assert!(network.clients[0]
        .resource(ResourceClass::Terrain)
        .unwrap()
        .tracker()
        .is_empty());
}

#[test]
fn losing_authority_drops_pending_regions() {
    init_logger();
    let mut network = TestNetwork::new(2);
    let (server_terrain, client_terrains) = with_terrain(&mut network);
    let now = network.now;
    let key = ResourceKey::tile(4, 4);

    network.clients[0]
        .claim_authority(ResourceClass::Terrain, now)
        .unwrap();
    client_terrains[0].write(key, RegionKind::Heightmap, heightmap(32));
    network.clients[0]
        .invalidate(key, Bounds::cell(0, 0), RegionKind::Heightmap, now)
        .unwrap();

    // the second client takes over before the debounce elapses
    network.clients[1]
        .claim_authority(ResourceClass::Terrain, now)
        .unwrap();
    network.run_for(Duration::from_millis(300));

    assert_eq!(
        network.clients[0].authority_state(ResourceClass::Terrain),
        Some(AuthorityState::OwnedRemote(network.peer(1)))
    );
    assert!(network.clients[0]
        .resource(ResourceClass::Terrain)
        .unwrap()
        .tracker()
        .is_empty());
    assert!(server_terrain.applied().is_empty());
}

#[test]
fn missing_adapter_is_reported() {
    init_logger();
    let mut network = TestNetwork::new(1);
    let now = network.now;

    network.clients[0]
        .claim_authority(ResourceClass::Objects, now)
        .unwrap();
    network.clients[0]
        .invalidate(
            ResourceKey::entity(12),
            Bounds::cell(0, 0),
            RegionKind::ObjectTransforms,
            now,
        )
        .unwrap();

    let mut steps = network.run_for(Duration::from_millis(200));
    let errors = drain_clients::<ErrorEvent, _>(&mut steps, 0);
    assert!(errors
        .iter()
        .any(|error| matches!(error, SyncError::Adapter(_))));
}

#[test]
fn large_regions_spill_to_disk() {
    init_logger();
    let transfer = TransferConfig {
        spill_threshold: 256,
        max_packet_payload: 512,
        ..fast_transfer_config()
    };
    let mut network = TestNetwork::with_transfer(1, transfer);
    let (server_terrain, client_terrains) = with_terrain(&mut network);
    let now = network.now;
    let key = ResourceKey::tile(9, 9);
    let bytes = heightmap(4096);

    network.clients[0]
        .claim_authority(ResourceClass::Terrain, now)
        .unwrap();
    client_terrains[0].write(key, RegionKind::Heightmap, bytes.clone());
    network.clients[0]
        .invalidate(key, Bounds::from_origin(0, 0, 64, 64), RegionKind::Heightmap, now)
        .unwrap();

    // the spill writer runs on its own thread; give it wall-clock time too
    let mut applied = Vec::new();
    for _ in 0..200 {
        let mut steps = network.run_for(Duration::from_millis(10));
        applied.extend(drain_server::<RegionAppliedEvent, _>(&mut steps));
        if !applied.is_empty() {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(applied.len(), 1);
    assert_eq!(server_terrain.read(key, RegionKind::Heightmap), Some(bytes));
}

#[cfg(feature = "zstd_support")]
#[test]
fn compressed_regions_arrive_intact() {
    use tilesync_shared::CompressionMode;

    init_logger();
    let transfer = TransferConfig {
        compression: Some(CompressionMode::Zstd(3)),
        ..fast_transfer_config()
    };
    let mut network = TestNetwork::with_transfer(1, transfer);
    let (server_terrain, client_terrains) = with_terrain(&mut network);
    let now = network.now;
    let key = ResourceKey::tile(1, 2);
    let bytes = vec![42u8; 2000];

    network.clients[0]
        .claim_authority(ResourceClass::Terrain, now)
        .unwrap();
    client_terrains[0].write(key, RegionKind::Heightmap, bytes.clone());
    network.clients[0]
        .invalidate(key, Bounds::cell(0, 0), RegionKind::Heightmap, now)
        .unwrap();

    let mut steps = network.run_for(Duration::from_millis(300));
    let applied = drain_server::<RegionAppliedEvent, _>(&mut steps);
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].raw_length, 2000);
    assert_eq!(server_terrain.read(key, RegionKind::Heightmap), Some(bytes));
}

#[test]
fn oversized_packet_payload_still_fits_frames() {
    init_logger();
    let transfer = TransferConfig {
        max_packet_payload: 1200,
        ..fast_transfer_config()
    };
    let mut network = TestNetwork::with_transfer(2, transfer);
    let (server_terrain, client_terrains) = with_terrain(&mut network);
    let now = network.now;

    let key = ResourceKey::tile(0, 4);
    let bytes = heightmap(3000);
    network.clients[0]
        .claim_authority(ResourceClass::Terrain, now)
        .unwrap();
    client_terrains[0].write(key, RegionKind::Heightmap, bytes.clone());
    network.clients[0]
        .invalidate(key, Bounds::from_origin(0, 0, 50, 60), RegionKind::Heightmap, now)
        .unwrap();

    let mut steps = network.run_for(Duration::from_millis(500));

    assert!(drain_clients::<ErrorEvent, _>(&mut steps, 0).is_empty());
    assert_eq!(drain_clients::<RegionSentEvent, _>(&mut steps, 0).len(), 1);
    assert_eq!(server_terrain.read(key, RegionKind::Heightmap), Some(bytes.clone()));
    assert_eq!(client_terrains[1].read(key, RegionKind::Heightmap), Some(bytes));
}
