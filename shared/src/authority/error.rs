use thiserror::Error;

use crate::sync::resource::ResourceClass;

/// Errors that can occur around write authority
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorityError {
    /// A write was attempted while another peer holds authority. Rejected
    /// locally before any traffic is produced.
    #[error("Authority conflict on {class}: write attempted while {owner} holds authority")]
    AuthorityConflict {
        class: ResourceClass,
        owner: &'static str,
    },

    /// The requested transition is not legal from the current state
    #[error("Invalid authority transition on {class}: cannot {operation} while {current_state}")]
    InvalidTransition {
        class: ResourceClass,
        operation: &'static str,
        current_state: &'static str,
    },

    /// The resource class was never registered with the Protocol
    #[error("Resource class {class} is not synchronized by this context")]
    ClassNotRegistered { class: ResourceClass },
}
