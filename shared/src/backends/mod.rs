mod timer;
mod timestamp;

pub use timer::Timer;
pub use timestamp::{TimeError, Timestamp};
