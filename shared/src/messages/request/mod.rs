mod pending_requests;
mod request_id;
mod response_future;

pub use pending_requests::{PendingKey, PendingRequests};
pub use request_id::RequestIdGenerator;
pub use response_future::{AckFuture, AckOutcome, RequestOutcome, ResponseContext, ResponseFuture};

use std::time::Duration;

use log::warn;

/// Clamp a caller-specified timeout to the configured ceiling, with a warning
pub fn clamp_timeout(requested: Duration, max: Duration) -> Duration {
    if requested > max {
        warn!(
            "request timeout of {:?} exceeds the maximum of {:?}; clamping",
            requested, max
        );
        return max;
    }
    requested
}
