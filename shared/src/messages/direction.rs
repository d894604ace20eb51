use crate::types::HostType;

/// Which side of the star topology may originate a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageDirection {
    FromServer,
    FromClient,
    FromEither,
}

impl MessageDirection {
    /// The one-way direction of messages arriving at `host_type`
    pub fn incoming(host_type: HostType) -> Self {
        match host_type {
            HostType::Server => MessageDirection::FromClient,
            HostType::Client => MessageDirection::FromServer,
        }
    }

    /// The one-way direction of messages leaving `host_type`
    pub fn outgoing(host_type: HostType) -> Self {
        Self::incoming(host_type.invert())
    }

    /// Direction a reply to a message of this direction travels in
    pub fn reverse(self) -> Self {
        match self {
            MessageDirection::FromServer => MessageDirection::FromClient,
            MessageDirection::FromClient => MessageDirection::FromServer,
            MessageDirection::FromEither => MessageDirection::FromEither,
        }
    }

    pub fn can_send(&self, host_type: HostType) -> bool {
        match self {
            MessageDirection::FromEither => true,
            direction => *direction == Self::outgoing(host_type),
        }
    }

    pub fn can_receive(&self, host_type: HostType) -> bool {
        match self {
            MessageDirection::FromEither => true,
            direction => *direction == Self::incoming(host_type),
        }
    }
}
