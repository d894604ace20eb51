use std::time::Instant;

use log::{debug, trace, warn};

use crate::{
    authority::{AuthorityRegister, AuthorityTransition},
    error::SyncError,
    sync::{
        adapter::{AdapterError, ResourceAdapter},
        dirty_region::{DirtyRegionTracker, RegionId},
        events::{AuthorityChanged, RegionApplied, RegionSent, SyncEvents, TransferDiscarded},
        resource::{Bounds, RegionKind, ResourceClass, ResourceKey},
        transfer::{
            decompress, ReceiveEvent, ReceivedData, StartHeader, TransferConfig, TransferError,
            TransferPacket, TransferReceiver, TransferSender,
        },
    },
    types::{HostType, PeerId},
};

/// Everything one resource class needs to stay in sync: its authority
/// register, the dirty regions waiting to go out, both halves of the transfer
/// engine and the adapter into world state.
pub struct ResourceSync {
    class: ResourceClass,
    authority: AuthorityRegister,
    tracker: DirtyRegionTracker,
    sender: TransferSender,
    receiver: TransferReceiver,
    adapter: Option<Box<dyn ResourceAdapter>>,
    config: TransferConfig,
}

impl ResourceSync {
    pub fn new(
        class: ResourceClass,
        host_type: HostType,
        local_peer: PeerId,
        config: &TransferConfig,
    ) -> Self {
        Self {
            class,
            authority: AuthorityRegister::new(class, host_type, local_peer),
            tracker: DirtyRegionTracker::new(),
            sender: TransferSender::new(class, config),
            receiver: TransferReceiver::new(class, config),
            adapter: None,
            config: config.clone(),
        }
    }

    pub fn class(&self) -> ResourceClass {
        self.class
    }

    pub fn authority(&self) -> &AuthorityRegister {
        &self.authority
    }

    pub(crate) fn authority_mut(&mut self) -> &mut AuthorityRegister {
        &mut self.authority
    }

    pub fn tracker(&self) -> &DirtyRegionTracker {
        &self.tracker
    }

    pub fn sender(&self) -> &TransferSender {
        &self.sender
    }

    pub fn receiver(&self) -> &TransferReceiver {
        &self.receiver
    }

    pub fn set_adapter(&mut self, adapter: Box<dyn ResourceAdapter>) {
        self.adapter = Some(adapter);
    }

    pub fn adapter(&self) -> Option<&dyn ResourceAdapter> {
        self.adapter.as_deref()
    }

    /// React to an authority transition the register just applied
    pub fn apply_transition(
        &mut self,
        transition: AuthorityTransition,
        now: Instant,
        events: &mut SyncEvents,
    ) {
        if !transition.changed() {
            return;
        }
        if transition.lost_local() {
            let dropped = self.tracker.len();
            self.tracker.clear();
            let aborted = self.sender.abort();
            debug!(
                "{} lost authority: dropped {} dirty regions, aborted session: {}",
                self.class,
                dropped,
                aborted.is_some()
            );
        }
        if transition.gained_local() {
            self.sender.authority_gained(now);
        }
        // whatever the old writer was sending is no longer authoritative
        self.receiver.reset();

        events.push_authority_change(AuthorityChanged {
            class: self.class,
            previous: transition.previous,
            current: transition.current,
        });
    }

    /// Record a local modification. Only the writer may invalidate.
    pub fn invalidate(
        &mut self,
        key: ResourceKey,
        bounds: Bounds,
        kind: RegionKind,
        now: Instant,
    ) -> Result<RegionId, SyncError> {
        self.authority.ensure_writer()?;
        if kind.class() != self.class {
            return Err(AdapterError::UnsupportedKind { kind }.into());
        }
        Ok(self.tracker.invalidate(key, bounds, kind, now))
    }

    /// Start a session if a region is ready, then hand at most one packet to
    /// `send`. A packet `send` refuses cancels its session and puts the region
    /// back in the queue. Returns whether a packet went out.
    pub fn poll_outgoing<F>(&mut self, now: Instant, events: &mut SyncEvents, send: F) -> bool
    where
        F: FnOnce(TransferPacket) -> Result<(), SyncError>,
    {
        if !self.authority.is_locally_owned() {
            return false;
        }
        if !self.sender.is_active() && self.sender.is_eligible(now) {
            self.begin_next(now, events);
        }

        let Some(emitted) = self.sender.poll_packet(now) else {
            return false;
        };
        let session = emitted.packet.session;
        if let Err(error) = send(emitted.packet) {
            warn!("could not send transfer packet for {}: {}", self.class, error);
            let region_id = emitted.completed_region.or_else(|| self.sender.cancel());
            if let Some(region_id) = region_id {
                self.tracker.requeue(region_id, now);
            }
            events.push_error(error);
            return false;
        }

        if let Some(region_id) = emitted.completed_region {
            if let Some(region) = self.tracker.remove(region_id) {
                events.push_region_sent(RegionSent {
                    class: self.class,
                    session,
                    key: region.key,
                    kind: region.kind,
                    bounds: region.bounds,
                });
            }
        }
        true
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    fn begin_next(&mut self, now: Instant, events: &mut SyncEvents) {
        let Some(region) = self
            .tracker
            .next_ready(now, self.config.debounce, self.config.force_after)
            .cloned()
        else {
            return;
        };
        let Some(adapter) = self.adapter.as_mut() else {
            warn!("{} has dirty regions but no adapter to serialize them", self.class);
            self.tracker.remove(region.id);
            events.push_error(AdapterError::Unavailable { class: self.class }.into());
            return;
        };

        let snapshot = match adapter.serialize_region(region.key, region.kind, &region.bounds) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(
                    "cannot serialize {} {:?} {:?}: {}",
                    region.key, region.kind, region.bounds, error
                );
                self.tracker.remove(region.id);
                events.push_error(error.into());
                return;
            }
        };
        match self.sender.begin(&region, snapshot, &self.config) {
            Ok(_) => {
                self.tracker.mark_in_flight(region.id);
            }
            Err(error) => {
                warn!("cannot start a session for {}: {}", region.key, error);
                self.tracker.remove(region.id);
                events.push_error(error.into());
            }
        }
    }

    /// Feed a packet from the current writer
    pub fn receive_packet(
        &mut self,
        packet: TransferPacket,
        now: Instant,
        events: &mut SyncEvents,
    ) {
        if self.authority.is_locally_owned() {
            trace!(
                "dropping packet {} of session {} for {}: this host is the writer",
                packet.packet_id,
                packet.session,
                self.class
            );
            return;
        }
        let received = self.receiver.receive(packet, now);
        self.handle_receive_events(received, events);
    }

    pub fn tick(&mut self, now: Instant, events: &mut SyncEvents) {
        let received = self.receiver.tick(now);
        self.handle_receive_events(received, events);
    }

    fn handle_receive_events(&mut self, received: Vec<ReceiveEvent>, events: &mut SyncEvents) {
        for event in received {
            match event {
                ReceiveEvent::Completed {
                    session,
                    start,
                    data,
                } => match self.apply(&start, data) {
                    Ok(()) => events.push_region_applied(RegionApplied {
                        class: self.class,
                        session,
                        key: start.key,
                        kind: start.kind,
                        bounds: start.bounds,
                        raw_length: start.raw_length,
                    }),
                    Err(error) => {
                        warn!(
                            "could not apply session {} for {}: {}",
                            session, self.class, error
                        );
                        events.push_discarded(TransferDiscarded {
                            class: self.class,
                            session,
                            error,
                        });
                    }
                },
                ReceiveEvent::Discarded { session, error } => {
                    events.push_discarded(TransferDiscarded {
                        class: self.class,
                        session,
                        error,
                    });
                }
            }
        }
    }

    fn apply(&mut self, start: &StartHeader, data: ReceivedData) -> Result<(), TransferError> {
        let class = self.class;
        let adapter = self
            .adapter
            .as_mut()
            .ok_or(AdapterError::Unavailable { class })?;

        match data {
            ReceivedData::Memory(bytes) if start.compressed => {
                let raw = decompress(&bytes, start.raw_length as usize)?;
                adapter.apply_region(start.key, start.kind, &start.bounds, &raw)?;
            }
            ReceivedData::Memory(bytes) => {
                adapter.apply_region(start.key, start.kind, &start.bounds, &bytes)?;
            }
            ReceivedData::Spilled(file) if start.compressed => {
                let bytes = std::fs::read(file.path()).map_err(|error| TransferError::SpillIo {
                    reason: format!("reading back {}: {}", file.path().display(), error),
                })?;
                let raw = decompress(&bytes, start.raw_length as usize)?;
                adapter.apply_region(start.key, start.kind, &start.bounds, &raw)?;
            }
            ReceivedData::Spilled(file) => {
                adapter.apply_region_from_file(start.key, start.kind, &start.bounds, file.path())?;
            }
        }
        Ok(())
    }
}
