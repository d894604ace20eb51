use std::time::{Duration, Instant};

/// A timer driven by explicit `now` values, so the simulation tick owns time
pub struct Timer {
    duration: Duration,
    last: Option<Instant>,
}

impl Timer {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            last: None,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn reset(&mut self, now: Instant) {
        self.last = Some(now);
    }

    /// Forget the last reset; the timer rings on the next check
    pub fn clear(&mut self) {
        self.last = None;
    }

    /// Whether `duration` has passed since the last reset. A timer that was
    /// never reset is always ringing.
    pub fn ringing(&self, now: Instant) -> bool {
        match self.last {
            Some(last) => now.saturating_duration_since(last) >= self.duration,
            None => true,
        }
    }
}
