/// End-to-end authority scenarios: one writer per class, server-ordered
/// claims, fallback to the server when the writer leaves
use std::time::Duration;

use tilesync_client::{AuthorityChangedEvent, Client, ClientConfig};
use tilesync_shared::{AuthorityState, PeerId, ResourceClass};
use tilesync_test::{assert_authority, drain_clients, protocol, TestNetwork};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn client_claim_is_confirmed_everywhere() {
    init_logger();
    let mut network = TestNetwork::new(2);
    let now = network.now;
    let writer = network.peer(0);

    network.clients[0]
        .claim_authority(ResourceClass::Terrain, now)
        .unwrap();
    assert_eq!(
        network.clients[0].authority_state(ResourceClass::Terrain),
        Some(AuthorityState::OwnedLocal)
    );

    network.run_for(Duration::from_millis(50));

    assert_authority!(
        network,
        ResourceClass::Terrain,
        server: AuthorityState::OwnedRemote(writer),
        clients: [AuthorityState::OwnedLocal, AuthorityState::OwnedRemote(writer)]
    );
    // other classes are untouched
    assert_eq!(
        network.server.authority_state(ResourceClass::Roads),
        Some(AuthorityState::Unowned)
    );
}

#[test]
fn last_claim_in_arrival_order_wins() {
    init_logger();
    let mut network = TestNetwork::new(2);
    let now = network.now;
    let second = network.peer(1);

    network.clients[0]
        .claim_authority(ResourceClass::NavMesh, now)
        .unwrap();
    network.clients[1]
        .claim_authority(ResourceClass::NavMesh, now)
        .unwrap();

    let mut steps = network.run_for(Duration::from_millis(50));

    assert_authority!(
        network,
        ResourceClass::NavMesh,
        server: AuthorityState::OwnedRemote(second),
        clients: [AuthorityState::OwnedRemote(second), AuthorityState::OwnedLocal]
    );

    let first_changes = drain_clients::<AuthorityChangedEvent, _>(&mut steps, 0);
    assert_eq!(
        first_changes.last().map(|change| change.current),
        Some(AuthorityState::OwnedRemote(second))
    );
}

#[test]
fn claiming_twice_is_an_invalid_transition() {
    init_logger();
    let mut network = TestNetwork::new(1);
    let now = network.now;

    network.clients[0]
        .claim_authority(ResourceClass::Objects, now)
        .unwrap();
    assert!(network.clients[0]
        .claim_authority(ResourceClass::Objects, now)
        .is_err());
}

#[test]
fn writer_disconnect_falls_back_to_server() {
    init_logger();
    let mut network = TestNetwork::new(2);
    let now = network.now;

    network.clients[0]
        .claim_authority(ResourceClass::Hierarchy, now)
        .unwrap();
    network.run_for(Duration::from_millis(50));

    network.drop_client(0);
    assert_eq!(
        network.server.authority_state(ResourceClass::Hierarchy),
        Some(AuthorityState::OwnedServerFallback)
    );

    network.run_for(Duration::from_millis(50));
    assert_eq!(
        network.clients[0].authority_state(ResourceClass::Hierarchy),
        Some(AuthorityState::OwnedServerFallback)
    );
}

#[test]
fn release_hands_authority_back_to_server() {
    init_logger();
    let mut network = TestNetwork::new(2);
    let now = network.now;

    network.clients[0]
        .claim_authority(ResourceClass::Roads, now)
        .unwrap();
    network.run_for(Duration::from_millis(50));

    let now = network.now;
    network.clients[0]
        .release_authority(ResourceClass::Roads, now)
        .unwrap();
    network.run_for(Duration::from_millis(50));

    assert_authority!(
        network,
        ResourceClass::Roads,
        server: AuthorityState::OwnedServerFallback,
        clients: [
            AuthorityState::OwnedServerFallback,
            AuthorityState::OwnedServerFallback,
        ]
    );
}

#[test]
fn late_joiner_learns_current_owner() {
    init_logger();
    let mut network = TestNetwork::new(1);
    let now = network.now;
    let writer = network.peer(0);

    network.clients[0]
        .claim_authority(ResourceClass::Terrain, now)
        .unwrap();
    network.run_for(Duration::from_millis(50));

    let late = Client::new(ClientConfig::new(PeerId::new(9)), protocol()).unwrap();
    network.join(late);
    network.run_for(Duration::from_millis(50));

    assert_eq!(
        network.clients[1].authority_state(ResourceClass::Terrain),
        Some(AuthorityState::OwnedRemote(writer))
    );
}

#[test]
fn server_claim_overrides_client_writer() {
    init_logger();
    let mut network = TestNetwork::new(1);
    let now = network.now;

    network.clients[0]
        .claim_authority(ResourceClass::Terrain, now)
        .unwrap();
    network.run_for(Duration::from_millis(50));

    let now = network.now;
    network
        .server
        .claim_authority(ResourceClass::Terrain, now)
        .unwrap();
    network.run_for(Duration::from_millis(50));

    assert_authority!(
        network,
        ResourceClass::Terrain,
        server: AuthorityState::OwnedLocal,
        clients: [AuthorityState::OwnedServerFallback]
    );
}
