use std::time::{Duration, Instant};

use log::trace;

use crate::sync::resource::{Bounds, RegionKind, ResourceKey};

pub type RegionId = u64;

/// An invalidated area of one resource that needs to be re-sent
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirtyRegion {
    pub id: RegionId,
    pub key: ResourceKey,
    pub kind: RegionKind,
    pub bounds: Bounds,
    pub first_touched: Instant,
    pub last_touched: Instant,
    in_flight: bool,
}

impl DirtyRegion {
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    fn mergeable_with(&self, key: ResourceKey, kind: RegionKind, bounds: &Bounds) -> bool {
        !self.in_flight && self.key == key && self.kind == kind && self.bounds.overlaps(bounds)
    }
}

/// Coalesces invalidations into as few regions as possible and picks which
/// one to send next
pub struct DirtyRegionTracker {
    regions: Vec<DirtyRegion>,
    next_id: RegionId,
}

impl DirtyRegionTracker {
    pub fn new() -> Self {
        Self {
            regions: Vec::new(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DirtyRegion> {
        self.regions.iter()
    }

    pub fn get(&self, id: RegionId) -> Option<&DirtyRegion> {
        self.regions.iter().find(|region| region.id == id)
    }

    /// Mark `bounds` dirty, merging with every overlapping region of the same
    /// resource and kind until none is left. Returns the id of the region that
    /// now covers `bounds`.
    pub fn invalidate(
        &mut self,
        key: ResourceKey,
        bounds: Bounds,
        kind: RegionKind,
        now: Instant,
    ) -> RegionId {
        let mut merged_bounds = bounds;
        let mut first_touched = now;
        let mut id = None;

        while let Some(index) = self
            .regions
            .iter()
            .position(|region| region.mergeable_with(key, kind, &merged_bounds))
        {
            let absorbed = self.regions.swap_remove(index);
            trace!(
                "merging {:?} into {:?} on {} ({:?})",
                absorbed.bounds,
                merged_bounds,
                key,
                kind
            );
            merged_bounds = merged_bounds.union(&absorbed.bounds);
            first_touched = first_touched.min(absorbed.first_touched);
            id = Some(id.map_or(absorbed.id, |current: RegionId| current.min(absorbed.id)));
        }

        let id = id.unwrap_or_else(|| {
            let id = self.next_id;
            self.next_id += 1;
            id
        });
        self.regions.push(DirtyRegion {
            id,
            key,
            kind,
            bounds: merged_bounds,
            first_touched,
            last_touched: now,
            in_flight: false,
        });
        id
    }

    /// The region to send next: the one untouched for longest among those
    /// past `debounce`, or failing that the oldest one past `force_after`
    pub fn next_ready(
        &self,
        now: Instant,
        debounce: Duration,
        force_after: Duration,
    ) -> Option<&DirtyRegion> {
        let idle = self
            .regions
            .iter()
            .filter(|region| !region.in_flight)
            .filter(|region| now.saturating_duration_since(region.last_touched) >= debounce)
            .min_by_key(|region| (region.last_touched, region.id));
        if idle.is_some() {
            return idle;
        }

        self.regions
            .iter()
            .filter(|region| !region.in_flight)
            .filter(|region| now.saturating_duration_since(region.first_touched) >= force_after)
            .min_by_key(|region| (region.first_touched, region.id))
    }

    /// A region that is being sent no longer absorbs new invalidations
    pub fn mark_in_flight(&mut self, id: RegionId) -> bool {
        match self.regions.iter_mut().find(|region| region.id == id) {
            Some(region) => {
                region.in_flight = true;
                true
            }
            None => false,
        }
    }

    /// Return an in-flight region to the queue after its session was aborted
    pub fn requeue(&mut self, id: RegionId, now: Instant) {
        let Some(index) = self.regions.iter().position(|region| region.id == id) else {
            return;
        };
        let region = self.regions.swap_remove(index);
        let merged_id = self.invalidate(region.key, region.bounds, region.kind, now);
        if let Some(merged) = self.regions.iter_mut().find(|r| r.id == merged_id) {
            merged.first_touched = merged.first_touched.min(region.first_touched);
        }
    }

    pub fn remove(&mut self, id: RegionId) -> Option<DirtyRegion> {
        let index = self.regions.iter().position(|region| region.id == id)?;
        Some(self.regions.swap_remove(index))
    }

    pub fn clear(&mut self) {
        self.regions.clear();
    }
}

impl Default for DirtyRegionTracker {
    fn default() -> Self {
        Self::new()
    }
}
