pub mod adapter;
pub mod dirty_region;
pub mod events;
pub mod resource;
pub mod resource_sync;
pub mod transfer;

pub use adapter::{AdapterError, EntityHandle, ResourceAdapter};
pub use dirty_region::{DirtyRegion, DirtyRegionTracker, RegionId};
pub use events::{
    AuthorityChanged, AuthorityChangedEvent, ConnectEvent, DisconnectEvent, ErrorEvent,
    MessageEvent, RegionApplied, RegionAppliedEvent, RegionSent, RegionSentEvent, RequestEvent,
    SyncEvent, SyncEvents, TransferDiscarded, TransferDiscardedEvent,
};
pub use resource::{Bounds, RegionKind, ResourceClass, ResourceKey};
pub use resource_sync::ResourceSync;
