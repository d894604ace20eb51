use thiserror::Error;

use crate::{
    authority::AuthorityError,
    messages::{HandlerFault, MessageError, RegistryError},
    sync::{adapter::AdapterError, transfer::TransferError},
};

/// Every error the sync context reports, one variant per layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Handler(#[from] HandlerFault),

    #[error(transparent)]
    Authority(#[from] AuthorityError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}
