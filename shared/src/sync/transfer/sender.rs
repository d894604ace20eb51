use std::time::Instant;

use log::{debug, trace};

use crate::{
    backends::Timer,
    sync::{
        dirty_region::{DirtyRegion, RegionId},
        resource::ResourceClass,
        transfer::{
            compression, config::TransferConfig, error::TransferError, header::StartHeader,
            packet::TransferPacket,
        },
    },
    types::{PacketId, SessionId},
};

struct SendSession {
    session: SessionId,
    region: RegionId,
    start: StartHeader,
    buffer: Vec<u8>,
    cursor: PacketId,
}

impl SendSession {
    fn chunk(&self, packet_id: PacketId) -> Vec<u8> {
        let chunk_size = self.start.chunk_size as usize;
        let begin = (packet_id as usize * chunk_size).min(self.buffer.len());
        let end = (begin + chunk_size).min(self.buffer.len());
        self.buffer[begin..end].to_vec()
    }
}

/// A packet ready to go out, and the region it completed if it was the last
pub struct EmittedPacket {
    pub packet: TransferPacket,
    pub completed_region: Option<RegionId>,
}

/// Sender half of the chunked transfer engine for one resource class.
/// Holds at most one active session and paces its packets.
pub struct TransferSender {
    class: ResourceClass,
    next_session: SessionId,
    active: Option<SendSession>,
    eligible_since: Option<Instant>,
    first_packet_timer: Timer,
    packet_timer: Timer,
}

impl TransferSender {
    pub fn new(class: ResourceClass, config: &TransferConfig) -> Self {
        Self {
            class,
            next_session: fastrand::u16(..),
            active: None,
            eligible_since: None,
            first_packet_timer: Timer::new(config.first_packet_delay),
            packet_timer: Timer::new(config.packet_interval),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.active.as_ref().map(|session| session.session)
    }

    pub fn active_region(&self) -> Option<RegionId> {
        self.active.as_ref().map(|session| session.region)
    }

    /// Authority was gained; packet 0 may go out once the first-packet delay
    /// has passed
    pub fn authority_gained(&mut self, now: Instant) {
        self.eligible_since = Some(now);
        self.first_packet_timer.reset(now);
    }

    /// Authority was lost: drop the active session. Returns its region.
    pub fn abort(&mut self) -> Option<RegionId> {
        self.eligible_since = None;
        let aborted = self.active.take()?;
        debug!(
            "aborting transfer session {} for {} at packet {}/{}",
            aborted.session, self.class, aborted.cursor, aborted.start.packet_count
        );
        Some(aborted.region)
    }

    /// A packet could not be handed to the transport: drop the active
    /// session but stay eligible, so its region can go out again in a fresh one
    pub fn cancel(&mut self) -> Option<RegionId> {
        let cancelled = self.active.take()?;
        debug!(
            "cancelling transfer session {} for {} at packet {}/{}",
            cancelled.session, self.class, cancelled.cursor, cancelled.start.packet_count
        );
        Some(cancelled.region)
    }

    pub fn is_eligible(&self, now: Instant) -> bool {
        self.eligible_since.is_some() && self.first_packet_timer.ringing(now)
    }

    /// Start a session for `region` from its serialized snapshot
    pub fn begin(
        &mut self,
        region: &DirtyRegion,
        snapshot: Vec<u8>,
        config: &TransferConfig,
    ) -> Result<SessionId, TransferError> {
        if config.max_packet_payload == 0 || config.max_packet_payload > u32::MAX as usize {
            return Err(TransferError::HeaderMismatch {
                reason: "max packet payload out of range",
            });
        }
        let raw_length = u32::try_from(snapshot.len()).map_err(|_| TransferError::HeaderMismatch {
            reason: "snapshot larger than 4 GiB",
        })?;

        let compressed = match config.compression {
            Some(mode) => compression::compress(mode, &snapshot)?,
            None => None,
        };
        let (buffer, is_compressed) = match compressed {
            Some(compressed) => (compressed, true),
            None => (snapshot, false),
        };

        let chunk_size = config.max_packet_payload as u32;
        let total_length = buffer.len() as u32;
        let start = StartHeader {
            key: region.key,
            kind: region.kind,
            bounds: region.bounds,
            total_length,
            packet_count: StartHeader::expected_packet_count(total_length, chunk_size),
            chunk_size,
            raw_length,
            compressed: is_compressed,
        };
        start.validate(self.class)?;

        let session = self.next_session;
        self.next_session = self.next_session.wrapping_add(1);
        debug!(
            "transfer session {} for {} {:?} {:?}: {} bytes in {} packets",
            session, region.key, region.kind, region.bounds, total_length, start.packet_count
        );
        self.active = Some(SendSession {
            session,
            region: region.id,
            start,
            buffer,
            cursor: 0,
        });
        Ok(session)
    }

    /// Emit the next packet of the active session if pacing allows it
    pub fn poll_packet(&mut self, now: Instant) -> Option<EmittedPacket> {
        let cursor = self.active.as_ref()?.cursor;
        if cursor == 0 && !self.is_eligible(now) {
            return None;
        }
        if !self.packet_timer.ringing(now) {
            return None;
        }

        let session = self.active.as_mut()?;
        let packet_id = session.cursor;
        let payload = session.chunk(packet_id);
        let packet = if packet_id == 0 {
            TransferPacket::first(self.class, session.session, session.start, payload)
        } else {
            TransferPacket::subsequent(self.class, session.session, packet_id, payload)
        };
        trace!(
            "session {} packet {}/{} ({} bytes)",
            session.session,
            packet_id + 1,
            session.start.packet_count,
            packet.payload.len()
        );
        session.cursor += 1;
        self.packet_timer.reset(now);

        let completed_region = if session.cursor >= session.start.packet_count {
            let region = session.region;
            self.active = None;
            Some(region)
        } else {
            None
        };
        Some(EmittedPacket {
            packet,
            completed_region,
        })
    }
}
