use thiserror::Error;

use tilesync_shared::{PeerId, SyncError};

#[derive(Debug, Error)]
pub enum TileSyncServerError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("server is not listening")]
    NotListening,

    #[error("could not send a frame to {peer}")]
    SendError { peer: PeerId },

    #[error("transport failed while receiving")]
    RecvError,
}
