use thiserror::Error;

use tilesync_shared::SyncError;

#[derive(Debug, Error)]
pub enum TileSyncClientError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("client is not connected")]
    NotConnected,

    #[error("could not send a frame to the server")]
    SendError,

    #[error("transport failed while receiving")]
    RecvError,
}
