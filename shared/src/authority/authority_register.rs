use log::{info, warn};

use crate::{
    authority::{
        authority_state::{AuthorityState, AuthorityTransition},
        error::AuthorityError,
        peer_directory::PeerDirectory,
    },
    sync::resource::ResourceClass,
    types::{HostType, PeerId},
};

/// Single-writer state machine for one resource class.
///
/// The register only tracks state. Whoever drives it is responsible for
/// sending the `AuthorityChange` a transition implies, and for tearing down
/// dirty regions and transfer sessions when `lost_local()` is reported.
pub struct AuthorityRegister {
    class: ResourceClass,
    host_type: HostType,
    local_peer: PeerId,
    state: AuthorityState,
}

impl AuthorityRegister {
    pub fn new(class: ResourceClass, host_type: HostType, local_peer: PeerId) -> Self {
        Self {
            class,
            host_type,
            local_peer,
            state: AuthorityState::Unowned,
        }
    }

    pub fn class(&self) -> ResourceClass {
        self.class
    }

    pub fn state(&self) -> AuthorityState {
        self.state
    }

    /// The peer currently permitted to write, if any
    pub fn owner(&self) -> Option<PeerId> {
        match self.state {
            AuthorityState::Unowned => None,
            AuthorityState::OwnedLocal => Some(self.local_peer),
            AuthorityState::OwnedRemote(peer) => Some(peer),
            AuthorityState::OwnedServerFallback => Some(PeerId::SERVER),
        }
    }

    /// Whether this host may write. The server is the writer while it holds
    /// the fallback.
    pub fn is_locally_owned(&self) -> bool {
        Self::is_local_state(self.host_type, self.state)
    }

    /// Take authority for this host
    pub fn claim_local(&mut self) -> Result<AuthorityTransition, AuthorityError> {
        if self.state == AuthorityState::OwnedLocal {
            return Err(AuthorityError::InvalidTransition {
                class: self.class,
                operation: "claim authority",
                current_state: self.state.name(),
            });
        }
        info!("{}: claiming authority for {}", self.local_peer, self.class);
        Ok(self.transition(AuthorityState::OwnedLocal))
    }

    /// Give up authority. The server keeps it as a fallback.
    pub fn release_local(&mut self) -> Result<AuthorityTransition, AuthorityError> {
        if self.state != AuthorityState::OwnedLocal {
            return Err(AuthorityError::InvalidTransition {
                class: self.class,
                operation: "release authority",
                current_state: self.state.name(),
            });
        }
        info!("{}: releasing authority for {}", self.local_peer, self.class);
        Ok(self.transition(AuthorityState::OwnedServerFallback))
    }

    /// Apply an `AuthorityChange` naming `owner`
    pub fn receive_authority_change(&mut self, owner: PeerId) -> AuthorityTransition {
        let next = if owner == self.local_peer && !owner.is_server() {
            AuthorityState::OwnedLocal
        } else if owner.is_server() {
            if self.host_type == HostType::Server && self.state == AuthorityState::OwnedLocal {
                // the server's own claim echoed back
                AuthorityState::OwnedLocal
            } else {
                AuthorityState::OwnedServerFallback
            }
        } else {
            AuthorityState::OwnedRemote(owner)
        };

        let transition = self.transition(next);
        if transition.changed() {
            info!(
                "{}: authority for {} is now {:?} (was {:?})",
                self.local_peer, self.class, transition.current, transition.previous
            );
        }
        transition
    }

    /// Server side: fall back to the server if `peer` held authority and is
    /// gone. Returns the transition to broadcast, if any.
    pub fn peer_disconnected(
        &mut self,
        peer: PeerId,
        directory: &dyn PeerDirectory,
    ) -> Option<AuthorityTransition> {
        if self.host_type != HostType::Server {
            return None;
        }
        if self.state != AuthorityState::OwnedRemote(peer) || directory.is_connected(&peer) {
            return None;
        }
        info!(
            "{} held authority for {} and disconnected; server takes over",
            peer, self.class
        );
        Some(self.transition(AuthorityState::OwnedServerFallback))
    }

    /// Fail fast when this host is not allowed to write
    pub fn ensure_writer(&self) -> Result<(), AuthorityError> {
        if self.is_locally_owned() {
            return Ok(());
        }
        let error = AuthorityError::AuthorityConflict {
            class: self.class,
            owner: self.state.name(),
        };
        warn!("{}: {}", self.local_peer, error);
        Err(error)
    }

    fn transition(&mut self, next: AuthorityState) -> AuthorityTransition {
        let previous = self.state;
        self.state = next;
        AuthorityTransition {
            previous,
            current: next,
            was_local: Self::is_local_state(self.host_type, previous),
            is_local: Self::is_local_state(self.host_type, next),
        }
    }

    fn is_local_state(host_type: HostType, state: AuthorityState) -> bool {
        match state {
            AuthorityState::OwnedLocal => true,
            AuthorityState::OwnedServerFallback => host_type == HostType::Server,
            _ => false,
        }
    }
}
