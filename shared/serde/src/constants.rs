/// Largest datagram the reference transports will carry without dropping it.
pub const MTU_SIZE_BYTES: usize = 1200;

/// Upper bound on element counts read from the wire, so a corrupt length
/// prefix cannot make a reader allocate unbounded memory.
pub const MAX_COLLECTION_LENGTH: u64 = 64 * 1024 * 1024;
