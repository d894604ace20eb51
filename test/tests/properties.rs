/// Property tests over the transfer engine, dirty-region tracker, request
/// ids and authority arbitration
use std::time::{Duration, Instant};

use proptest::prelude::*;

use tilesync_shared::{
    messages::request::RequestIdGenerator,
    sync::transfer::{ReceiveEvent, ReceivedData, TransferReceiver, TransferSender},
    AuthorityRegister, Bounds, DirtyRegionTracker, HostType, PeerId, RegionKind, ResourceClass,
    ResourceKey, TransferConfig, TransferPacket,
};

fn config(chunk: usize) -> TransferConfig {
    TransferConfig {
        max_packet_payload: chunk,
        ..Default::default()
    }
}

/// Every packet of one session carrying `data`
fn packetize(data: &[u8], chunk: usize) -> Vec<TransferPacket> {
    let config = config(chunk);
    let mut tracker = DirtyRegionTracker::new();
    let mut now = Instant::now();
    let id = tracker.invalidate(
        ResourceKey::tile(3, 7),
        Bounds::from_origin(0, 0, 16, 16),
        RegionKind::Heightmap,
        now,
    );
    let region = tracker.get(id).cloned().unwrap();

    let mut sender = TransferSender::new(ResourceClass::Terrain, &config);
    sender.authority_gained(now);
    sender.begin(&region, data.to_vec(), &config).unwrap();

    let mut packets = Vec::new();
    while sender.is_active() {
        now += config.first_packet_delay.max(config.packet_interval);
        if let Some(emitted) = sender.poll_packet(now) {
            packets.push(emitted.packet);
        }
    }
    packets
}

fn completed(events: &[ReceiveEvent]) -> Option<Vec<u8>> {
    events.iter().find_map(|event| match event {
        ReceiveEvent::Completed {
            data: ReceivedData::Memory(buffer),
            ..
        } => Some(buffer.clone()),
        _ => None,
    })
}

#[test]
fn lost_final_packets_are_reported_incomplete() {
    let data: Vec<u8> = (0..450u32).map(|byte| byte as u8).collect();
    let packets = packetize(&data, 100);
    assert_eq!(packets.len(), 5);

    let config = config(100);
    let mut receiver = TransferReceiver::new(ResourceClass::Terrain, &config);
    let now = Instant::now();
    for packet in packets.into_iter().take(4) {
        assert!(receiver.receive(packet, now).is_empty());
    }

    let events = receiver.tick(now + config.receive_timeout + Duration::from_millis(1));
    assert!(matches!(
        events.as_slice(),
        [ReceiveEvent::Discarded {
            error: tilesync_shared::TransferError::TransferIncomplete {
                received: 4,
                expected: 5,
                ..
            },
            ..
        }]
    ));
    assert_eq!(receiver.active_session(), None);
}

proptest! {
    #[test]
    fn reassembles_in_any_order(
        data in proptest::collection::vec(any::<u8>(), 0..3000),
        chunk in 1usize..300,
        seed in any::<u64>(),
    ) {
        let mut packets = packetize(&data, chunk);
        packets.sort_by_key(|packet| (u64::from(packet.packet_id) ^ seed).wrapping_mul(0x9E37_79B9_7F4A_7C15));

        let mut receiver = TransferReceiver::new(ResourceClass::Terrain, &config(chunk));
        let now = Instant::now();
        let mut events = Vec::new();
        for packet in packets {
            events.extend(receiver.receive(packet, now));
        }

        prop_assert_eq!(completed(&events), Some(data));
        prop_assert_eq!(receiver.held_packets(), 0);
    }

    #[test]
    fn request_ids_strictly_increase(ticks in proptest::collection::vec(-5i64..1_000, 1..200)) {
        let mut generator = RequestIdGenerator::new();
        let mut last = generator.last_issued();
        for tick in ticks {
            let id = generator.next_id_at(tick);
            prop_assert!(id > last);
            last = id;
        }
    }

    #[test]
    fn invalidation_is_idempotent_and_covers_union(
        rects in proptest::collection::vec((-20i32..20, -20i32..20, 1u32..8, 1u32..8), 1..20),
    ) {
        let key = ResourceKey::tile(0, 0);
        let now = Instant::now();
        let mut tracker = DirtyRegionTracker::new();
        for (x, y, width, height) in &rects {
            tracker.invalidate(key, Bounds::from_origin(*x, *y, *width, *height), RegionKind::Holes, now);
        }
        let before: Vec<Bounds> = tracker.iter().map(|region| region.bounds).collect();

        for (x, y, width, height) in &rects {
            tracker.invalidate(key, Bounds::from_origin(*x, *y, *width, *height), RegionKind::Holes, now);
        }
        let mut after: Vec<Bounds> = tracker.iter().map(|region| region.bounds).collect();
        let mut before_sorted = before.clone();
        before_sorted.sort_by_key(|bounds| (bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y));
        after.sort_by_key(|bounds| (bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y));
        prop_assert_eq!(before_sorted, after);

        // every edit is covered, and no two remaining regions overlap
        for (x, y, width, height) in &rects {
            let edit = Bounds::from_origin(*x, *y, *width, *height);
            prop_assert!(tracker.iter().any(|region| region.bounds.contains(&edit)));
        }
        let regions: Vec<Bounds> = tracker.iter().map(|region| region.bounds).collect();
        for (index, a) in regions.iter().enumerate() {
            for b in regions.iter().skip(index + 1) {
                prop_assert!(!a.overlaps(b));
            }
        }
    }

    #[test]
    fn at_most_one_writer_after_convergence(claims in proptest::collection::vec(0u64..4, 1..30)) {
        let class = ResourceClass::Roads;
        let mut server = AuthorityRegister::new(class, HostType::Server, PeerId::SERVER);
        let mut clients: Vec<AuthorityRegister> = (1..=3)
            .map(|id| AuthorityRegister::new(class, HostType::Client, PeerId::new(id)))
            .collect();

        for claimant in claims {
            let owner = if claimant == 0 {
                let _ = server.claim_local();
                PeerId::SERVER
            } else {
                let client = &mut clients[(claimant - 1) as usize];
                let _ = client.claim_local();
                let owner = PeerId::new(claimant);
                server.receive_authority_change(owner);
                owner
            };
            for client in clients.iter_mut() {
                client.receive_authority_change(owner);
            }
            // every replayed broadcast leaves exactly one writer behind
            prop_assert_eq!(writers(&server, &clients), 1);
        }
    }
}

fn writers(server: &AuthorityRegister, clients: &[AuthorityRegister]) -> usize {
    clients
        .iter()
        .filter(|client| client.is_locally_owned())
        .count()
        + usize::from(server.is_locally_owned())
}
