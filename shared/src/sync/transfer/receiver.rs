use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use log::{debug, trace, warn};

use crate::{
    sync::{
        resource::ResourceClass,
        transfer::{
            config::TransferConfig, error::TransferError, header::StartHeader,
            packet::TransferPacket, presence_mask::PresenceMask, spill::SpillFile,
        },
    },
    types::{PacketId, SessionId},
    wrapping_number::{sequence_less_than, wrapping_diff},
};

/// Packets of not-yet-started sessions kept before the oldest are refused
const MAX_HELD_PACKETS: usize = 4096;

/// Where a reassembled snapshot lives
pub enum ReceivedData {
    Memory(Vec<u8>),
    Spilled(SpillFile),
}

/// Something the receiver decided, to be acted on by its owner
pub enum ReceiveEvent {
    /// Every packet arrived; the data is ready to be applied
    Completed {
        session: SessionId,
        start: StartHeader,
        data: ReceivedData,
    },
    /// The session was dropped without applying anything
    Discarded {
        session: SessionId,
        error: TransferError,
    },
}

enum Store {
    Memory(Vec<u8>),
    Spill(SpillFile),
}

struct ReceiveSession {
    session: SessionId,
    start: StartHeader,
    mask: PresenceMask,
    store: Store,
    started_at: Instant,
    final_seen_at: Option<Instant>,
}

impl ReceiveSession {
    fn is_ready(&self) -> bool {
        if !self.mask.is_complete() {
            return false;
        }
        match &self.store {
            Store::Memory(_) => true,
            Store::Spill(file) => file.is_idle(),
        }
    }

    fn incomplete_error(&self) -> TransferError {
        TransferError::TransferIncomplete {
            session: self.session,
            received: self.mask.count_set(),
            expected: self.mask.len(),
        }
    }
}

/// Receiver half of the chunked transfer engine for one resource class.
///
/// Reassembles packets in any order through a presence mask. Packets of a
/// session whose packet 0 has not arrived yet are held and replayed, lowest
/// id first, once it does. A session that cannot complete is discarded whole.
pub struct TransferReceiver {
    class: ResourceClass,
    reorder_grace: Duration,
    receive_timeout: Duration,
    spill_threshold: usize,
    spill_dir: std::path::PathBuf,
    current: Option<ReceiveSession>,
    newest_session: Option<SessionId>,
    held: BTreeMap<(SessionId, PacketId), TransferPacket>,
    events: Vec<ReceiveEvent>,
}

impl TransferReceiver {
    pub fn new(class: ResourceClass, config: &TransferConfig) -> Self {
        Self {
            class,
            reorder_grace: config.reorder_grace,
            receive_timeout: config.receive_timeout,
            spill_threshold: config.spill_threshold,
            spill_dir: config.spill_dir.clone(),
            current: None,
            newest_session: None,
            held: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    pub fn class(&self) -> ResourceClass {
        self.class
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.current.as_ref().map(|session| session.session)
    }

    pub fn held_packets(&self) -> usize {
        self.held.len()
    }

    /// Forget everything, used whenever authority for the class changes
    pub fn reset(&mut self) {
        if let Some(session) = self.current.take() {
            debug!(
                "resetting receiver for {}: dropping session {}",
                self.class, session.session
            );
        }
        self.newest_session = None;
        self.held.clear();
    }

    pub fn receive(&mut self, packet: TransferPacket, now: Instant) -> Vec<ReceiveEvent> {
        if packet.packet_id == 0 {
            self.receive_first(packet, now);
        } else {
            self.receive_subsequent(packet, now);
        }
        self.finish_if_ready();
        std::mem::take(&mut self.events)
    }

    /// Apply deadlines and collect spill-file progress
    pub fn tick(&mut self, now: Instant) -> Vec<ReceiveEvent> {
        let mut failure = None;
        if let Some(session) = self.current.as_mut() {
            if let Store::Spill(file) = &mut session.store {
                if let Err(error) = file.poll() {
                    failure = Some(error);
                }
            }
        }
        if let Some(error) = failure {
            self.discard(error);
        }

        self.finish_if_ready();

        if let Some(session) = &self.current {
            if session.mask.is_complete() {
                // waiting on the spill file only
            } else if session
                .final_seen_at
                .is_some_and(|seen| now.saturating_duration_since(seen) >= self.reorder_grace)
            {
                let error = session.incomplete_error();
                self.discard(error);
            } else if now.saturating_duration_since(session.started_at) >= self.receive_timeout {
                let error = session.incomplete_error();
                self.discard(error);
            }
        }
        std::mem::take(&mut self.events)
    }

    fn receive_first(&mut self, mut packet: TransferPacket, now: Instant) {
        let Some(start) = packet.start.take() else {
            trace!("packet 0 of session {} without a start header", packet.session);
            return;
        };

        if let Some(newest) = self.newest_session {
            if !supersedes(packet.session, newest) {
                trace!(
                    "ignoring packet 0 of stale session {} (newest is {})",
                    packet.session,
                    newest
                );
                return;
            }
        }

        if let Err(error) = start.validate(self.class) {
            warn!(
                "discarding session {} for {}: {}",
                packet.session, self.class, error
            );
            self.events.push(ReceiveEvent::Discarded {
                session: packet.session,
                error,
            });
            return;
        }

        // a new session supersedes an unfinished one
        if let Some(current) = &self.current {
            let error = current.incomplete_error();
            self.discard(error);
        }

        let store = if start.total_length as usize > self.spill_threshold {
            match SpillFile::create(&self.spill_dir, packet.session, start.total_length as u64) {
                Ok(file) => Store::Spill(file),
                Err(error) => {
                    warn!(
                        "discarding session {} for {}: {}",
                        packet.session, self.class, error
                    );
                    self.events.push(ReceiveEvent::Discarded {
                        session: packet.session,
                        error,
                    });
                    return;
                }
            }
        } else {
            Store::Memory(vec![0; start.total_length as usize])
        };

        debug!(
            "session {} for {} {:?} started: {} bytes in {} packets",
            packet.session, start.key, start.kind, start.total_length, start.packet_count
        );
        let session = packet.session;
        self.newest_session = Some(session);
        self.current = Some(ReceiveSession {
            session,
            start,
            mask: PresenceMask::new(start.packet_count),
            store,
            started_at: now,
            final_seen_at: None,
        });
        self.accept(packet, now);

        // replay anything that raced ahead of packet 0, lowest id first
        let held: Vec<(SessionId, PacketId)> = self
            .held
            .range((session, 1)..=(session, PacketId::MAX))
            .map(|(key, _)| *key)
            .collect();
        for key in held {
            if let Some(packet) = self.held.remove(&key) {
                if self.current.is_none() {
                    break;
                }
                self.accept(packet, now);
            }
        }
        self.held
            .retain(|(held_session, _), _| !sequence_less_than(*held_session, session));
    }

    fn receive_subsequent(&mut self, packet: TransferPacket, now: Instant) {
        if let Some(current) = &self.current {
            if current.session == packet.session {
                self.accept(packet, now);
                return;
            }
        }

        let is_stale = self
            .newest_session
            .is_some_and(|newest| !supersedes(packet.session, newest));
        if is_stale {
            trace!(
                "dropping packet {} of finished session {}",
                packet.packet_id,
                packet.session
            );
            return;
        }
        if self.held.len() >= MAX_HELD_PACKETS {
            warn!(
                "holding list for {} is full; dropping packet {} of session {}",
                self.class, packet.packet_id, packet.session
            );
            return;
        }
        trace!(
            "holding packet {} of session {} until its packet 0 arrives",
            packet.packet_id,
            packet.session
        );
        self.held.insert((packet.session, packet.packet_id), packet);
    }

    fn accept(&mut self, packet: TransferPacket, now: Instant) {
        let Some(session) = self.current.as_mut() else {
            return;
        };
        let start = session.start;

        let Some(expected_length) = start.packet_length(packet.packet_id) else {
            let error = TransferError::PacketOutOfRange {
                session: session.session,
                packet_id: packet.packet_id,
                packet_count: start.packet_count,
            };
            self.discard(error);
            return;
        };
        if packet.payload.len() as u32 != expected_length {
            self.discard(TransferError::HeaderMismatch {
                reason: "packet length differs from the start header",
            });
            return;
        }

        if !session.mask.set(packet.packet_id) {
            trace!("duplicate packet {} of session {}", packet.packet_id, session.session);
            return;
        }
        if packet.packet_id + 1 == start.packet_count {
            session.final_seen_at = Some(now);
        }

        let offset = packet.packet_id as usize * start.chunk_size as usize;
        let write = match &mut session.store {
            Store::Memory(buffer) => {
                buffer[offset..offset + packet.payload.len()].copy_from_slice(&packet.payload);
                Ok(())
            }
            Store::Spill(file) => file.write(offset as u64, packet.payload),
        };
        if let Err(error) = write {
            self.discard(error);
        }
    }

    fn finish_if_ready(&mut self) {
        if !self.current.as_ref().is_some_and(|session| session.is_ready()) {
            return;
        }
        let Some(session) = self.current.take() else {
            return;
        };
        debug!(
            "session {} for {} complete ({} packets)",
            session.session,
            self.class,
            session.mask.len()
        );
        let data = match session.store {
            Store::Memory(buffer) => ReceivedData::Memory(buffer),
            Store::Spill(file) => ReceivedData::Spilled(file),
        };
        self.events.push(ReceiveEvent::Completed {
            session: session.session,
            start: session.start,
            data,
        });
    }

    fn discard(&mut self, error: TransferError) {
        let Some(session) = self.current.take() else {
            return;
        };
        let expected = session.mask.len().max(1);
        let lost = session.mask.count_missing();
        warn!(
            "discarding session {} for {}: lost {}/{} packets ({:.1}%): {}",
            session.session,
            self.class,
            lost,
            expected,
            lost as f32 * 100.0 / expected as f32,
            error
        );
        self.events.push(ReceiveEvent::Discarded {
            session: session.session,
            error,
        });
    }
}

/// Whether `session` was started after `newest`, across the u16 wrap
fn supersedes(session: SessionId, newest: SessionId) -> bool {
    wrapping_diff(newest, session) > 0
}
