use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tilesync_shared::{
    AdapterError, Bounds, EntityHandle, RegionKind, ResourceAdapter, ResourceClass, ResourceKey,
};

type Tiles = Arc<Mutex<HashMap<(ResourceKey, RegionKind), Vec<u8>>>>;

#[derive(Clone, Default)]
struct TileStore {
    tiles: Tiles,
    applied: Arc<Mutex<Vec<(ResourceKey, RegionKind, Bounds)>>>,
}

impl TileStore {
    fn write(&self, key: ResourceKey, kind: RegionKind, bytes: Vec<u8>) {
        self.tiles.lock().unwrap().insert((key, kind), bytes);
    }

    fn read(&self, key: ResourceKey, kind: RegionKind) -> Option<Vec<u8>> {
        self.tiles.lock().unwrap().get(&(key, kind)).cloned()
    }

    fn serialize(&self, key: ResourceKey, kind: RegionKind) -> Result<Vec<u8>, AdapterError> {
        self.read(key, kind)
            .ok_or(AdapterError::ResourceNotFound { key })
    }

    fn apply(&self, key: ResourceKey, kind: RegionKind, bounds: &Bounds, bytes: &[u8]) {
        self.write(key, kind, bytes.to_vec());
        self.applied.lock().unwrap().push((key, kind, *bounds));
    }

    fn find(&self, key: ResourceKey) -> Option<EntityHandle> {
        self.tiles
            .lock()
            .unwrap()
            .keys()
            .any(|(tile, _)| *tile == key)
            .then(|| EntityHandle(key.to_u64()))
    }
}

/// Heightmaps, splatmaps and hole masks keyed by tile
#[derive(Clone, Default)]
pub struct TestTerrain {
    store: TileStore,
}

impl TestTerrain {
    pub fn new() -> Self {
        Self::default()
    }

    /// A local edit, made before invalidating the region
    pub fn write(&self, key: ResourceKey, kind: RegionKind, bytes: Vec<u8>) {
        self.store.write(key, kind, bytes);
    }

    pub fn read(&self, key: ResourceKey, kind: RegionKind) -> Option<Vec<u8>> {
        self.store.read(key, kind)
    }

    /// Every region applied from the network, oldest first
    pub fn applied(&self) -> Vec<(ResourceKey, RegionKind, Bounds)> {
        self.store.applied.lock().unwrap().clone()
    }
}

impl ResourceAdapter for TestTerrain {
    fn serialize_region(
        &mut self,
        key: ResourceKey,
        kind: RegionKind,
        _bounds: &Bounds,
    ) -> Result<Vec<u8>, AdapterError> {
        if kind.class() != ResourceClass::Terrain {
            return Err(AdapterError::UnsupportedKind { kind });
        }
        self.store.serialize(key, kind)
    }

    fn apply_region(
        &mut self,
        key: ResourceKey,
        kind: RegionKind,
        bounds: &Bounds,
        bytes: &[u8],
    ) -> Result<(), AdapterError> {
        if kind.class() != ResourceClass::Terrain {
            return Err(AdapterError::UnsupportedKind { kind });
        }
        self.store.apply(key, kind, bounds, bytes);
        Ok(())
    }

    fn find_entity(&self, key: ResourceKey) -> Option<EntityHandle> {
        self.store.find(key)
    }
}

/// Navmesh tiles stored as packed `u32` vertex indices
#[derive(Clone, Default)]
pub struct TestNavMesh {
    store: TileStore,
}

impl TestNavMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&self, key: ResourceKey, indices: &[u32]) {
        let bytes = indices.iter().flat_map(|index| index.to_le_bytes()).collect();
        self.store.write(key, RegionKind::NavMeshTile, bytes);
    }

    pub fn read(&self, key: ResourceKey) -> Option<Vec<u32>> {
        let bytes = self.store.read(key, RegionKind::NavMeshTile)?;
        Some(
            bytes
                .chunks_exact(4)
                .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect(),
        )
    }

    pub fn applied(&self) -> Vec<(ResourceKey, RegionKind, Bounds)> {
        self.store.applied.lock().unwrap().clone()
    }
}

impl ResourceAdapter for TestNavMesh {
    fn serialize_region(
        &mut self,
        key: ResourceKey,
        kind: RegionKind,
        _bounds: &Bounds,
    ) -> Result<Vec<u8>, AdapterError> {
        if kind != RegionKind::NavMeshTile {
            return Err(AdapterError::UnsupportedKind { kind });
        }
        self.store.serialize(key, kind)
    }

    fn apply_region(
        &mut self,
        key: ResourceKey,
        kind: RegionKind,
        bounds: &Bounds,
        bytes: &[u8],
    ) -> Result<(), AdapterError> {
        if kind != RegionKind::NavMeshTile {
            return Err(AdapterError::UnsupportedKind { kind });
        }
        if bytes.len() % 4 != 0 {
            return Err(AdapterError::InvalidData {
                reason: format!("{} bytes is not a whole number of indices", bytes.len()),
            });
        }
        self.store.apply(key, kind, bounds, bytes);
        Ok(())
    }

    fn find_entity(&self, key: ResourceKey) -> Option<EntityHandle> {
        self.store.find(key)
    }
}
