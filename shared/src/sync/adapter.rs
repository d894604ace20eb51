use std::path::Path;

use thiserror::Error;

use crate::sync::resource::{Bounds, RegionKind, ResourceClass, ResourceKey};

/// Handle to a world entity, opaque to the sync engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntityHandle(pub u64);

/// Failures reported by the world-state collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("Resource {key} not found")]
    ResourceNotFound { key: ResourceKey },

    #[error("Region kind {kind:?} is not handled by this adapter")]
    UnsupportedKind { kind: RegionKind },

    /// The bytes do not fit the region they are applied to
    #[error("Invalid region data: {reason}")]
    InvalidData { reason: String },

    #[error("I/O error: {reason}")]
    Io { reason: String },

    /// No adapter was registered for the class
    #[error("No resource adapter registered for {class}")]
    Unavailable { class: ResourceClass },
}

/// Glue between the sync engine and the world state for one resource class.
///
/// The engine calls these only at session start and finish; it never touches
/// world state while a transfer is in flight.
pub trait ResourceAdapter {
    /// Snapshot the current contents of `bounds`
    fn serialize_region(
        &mut self,
        key: ResourceKey,
        kind: RegionKind,
        bounds: &Bounds,
    ) -> Result<Vec<u8>, AdapterError>;

    /// Overwrite `bounds` with a snapshot produced by `serialize_region` on
    /// another peer
    fn apply_region(
        &mut self,
        key: ResourceKey,
        kind: RegionKind,
        bounds: &Bounds,
        bytes: &[u8],
    ) -> Result<(), AdapterError>;

    fn find_entity(&self, key: ResourceKey) -> Option<EntityHandle>;

    /// Apply a snapshot that was spilled to disk. Adapters that can stream
    /// from a file should override this.
    fn apply_region_from_file(
        &mut self,
        key: ResourceKey,
        kind: RegionKind,
        bounds: &Bounds,
        path: &Path,
    ) -> Result<(), AdapterError> {
        let bytes = std::fs::read(path).map_err(|error| AdapterError::Io {
            reason: format!("{}: {}", path.display(), error),
        })?;
        self.apply_region(key, kind, bounds, &bytes)
    }
}
