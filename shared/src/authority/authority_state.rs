use crate::types::PeerId;

/// Who may write a resource class, as seen from one host
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthorityState {
    Unowned,
    OwnedLocal,
    OwnedRemote(PeerId),
    /// The server holds authority because nobody else does
    OwnedServerFallback,
}

impl AuthorityState {
    pub fn name(&self) -> &'static str {
        match self {
            AuthorityState::Unowned => "Unowned",
            AuthorityState::OwnedLocal => "OwnedLocal",
            AuthorityState::OwnedRemote(_) => "OwnedRemote",
            AuthorityState::OwnedServerFallback => "OwnedServerFallback",
        }
    }

    pub fn is_owned(&self) -> bool {
        !matches!(self, AuthorityState::Unowned)
    }
}

/// A change of authority state, as applied by the register
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthorityTransition {
    pub previous: AuthorityState,
    pub current: AuthorityState,
    pub(crate) was_local: bool,
    pub(crate) is_local: bool,
}

impl AuthorityTransition {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }

    /// This host was the writer before and no longer is
    pub fn lost_local(&self) -> bool {
        self.was_local && !self.is_local
    }

    pub fn gained_local(&self) -> bool {
        !self.was_local && self.is_local
    }
}
