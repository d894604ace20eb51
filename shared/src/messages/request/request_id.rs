use crate::{backends::Timestamp, types::RequestId};

/// Issues request ids that are strictly increasing for the lifetime of the
/// process, even when the wall clock stalls, repeats or steps backwards.
pub struct RequestIdGenerator {
    last_issued: RequestId,
}

impl RequestIdGenerator {
    pub fn new() -> Self {
        Self { last_issued: 0 }
    }

    pub fn next_id(&mut self) -> RequestId {
        let tick = Timestamp::try_now_ticks().unwrap_or(0);
        self.next_id_at(tick)
    }

    /// Take the larger of the wall-clock tick and the last id plus one
    pub fn next_id_at(&mut self, tick: i64) -> RequestId {
        let id = tick.max(self.last_issued.saturating_add(1));
        self.last_issued = id;
        id
    }

    pub fn last_issued(&self) -> RequestId {
        self.last_issued
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
