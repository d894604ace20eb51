pub mod authority_message;
pub mod authority_register;
pub mod authority_state;
pub mod error;
pub mod peer_directory;

pub use authority_message::AuthorityChange;
pub use authority_register::AuthorityRegister;
pub use authority_state::{AuthorityState, AuthorityTransition};
pub use error::AuthorityError;
pub use peer_directory::PeerDirectory;
