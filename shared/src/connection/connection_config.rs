use std::{default::Default, time::Duration};

use crate::constants::{DEFAULT_MAX_FRAME_BYTES, DEFAULT_REQUEST_TIMEOUT, MAX_REQUEST_TIMEOUT};

/// Contains Config properties which will be used by a Server or Client
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Largest single frame the transport is trusted to deliver
    pub max_frame_bytes: usize,
    /// Timeout used by requests issued without an explicit timeout
    pub default_request_timeout: Duration,
    /// Requests asking for a longer timeout are clamped to this, with a warning
    pub max_request_timeout: Duration,
}

impl ConnectionConfig {
    pub fn new(
        max_frame_bytes: usize,
        default_request_timeout: Duration,
        max_request_timeout: Duration,
    ) -> Self {
        Self {
            max_frame_bytes,
            default_request_timeout,
            max_request_timeout,
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            default_request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_request_timeout: MAX_REQUEST_TIMEOUT,
        }
    }
}
