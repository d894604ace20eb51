use std::fmt::{Display, Formatter};

/// Returned when a reader runs out of bytes or meets a value it cannot decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerdeErr;

impl Display for SerdeErr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Serde deserialization error")
    }
}

impl std::error::Error for SerdeErr {}
