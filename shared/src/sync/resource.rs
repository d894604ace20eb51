use std::fmt;

use tilesync_serde::{ByteReader, ByteWrite, ConstByteLength, Serde, SerdeErr};

/// A family of synchronized sub-resources. Authority is held per class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceClass {
    Terrain,
    NavMesh,
    Objects,
    Hierarchy,
    Roads,
}

impl ResourceClass {
    pub const ALL: [ResourceClass; 5] = [
        ResourceClass::Terrain,
        ResourceClass::NavMesh,
        ResourceClass::Objects,
        ResourceClass::Hierarchy,
        ResourceClass::Roads,
    ];

    fn to_u8(self) -> u8 {
        match self {
            ResourceClass::Terrain => 0,
            ResourceClass::NavMesh => 1,
            ResourceClass::Objects => 2,
            ResourceClass::Hierarchy => 3,
            ResourceClass::Roads => 4,
        }
    }

    fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Serde for ResourceClass {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.to_u8().ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Self::from_u8(u8::de(reader)?).ok_or(SerdeErr)
    }

    fn byte_length(&self) -> u32 {
        1
    }
}

impl ConstByteLength for ResourceClass {
    fn const_byte_length() -> u32 {
        1
    }
}

/// What part of a resource a dirty region covers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegionKind {
    Heightmap,
    Splatmap,
    Holes,
    NavMeshTile,
    ObjectTransforms,
    HierarchyTransforms,
    RoadTransforms,
}

impl RegionKind {
    const ALL: [RegionKind; 7] = [
        RegionKind::Heightmap,
        RegionKind::Splatmap,
        RegionKind::Holes,
        RegionKind::NavMeshTile,
        RegionKind::ObjectTransforms,
        RegionKind::HierarchyTransforms,
        RegionKind::RoadTransforms,
    ];

    pub fn class(&self) -> ResourceClass {
        match self {
            RegionKind::Heightmap | RegionKind::Splatmap | RegionKind::Holes => {
                ResourceClass::Terrain
            }
            RegionKind::NavMeshTile => ResourceClass::NavMesh,
            RegionKind::ObjectTransforms => ResourceClass::Objects,
            RegionKind::HierarchyTransforms => ResourceClass::Hierarchy,
            RegionKind::RoadTransforms => ResourceClass::Roads,
        }
    }

    fn to_u8(self) -> u8 {
        Self::ALL
            .iter()
            .position(|kind| *kind == self)
            .unwrap_or_default() as u8
    }
}

impl Serde for RegionKind {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.to_u8().ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Self::ALL
            .get(u8::de(reader)? as usize)
            .copied()
            .ok_or(SerdeErr)
    }

    fn byte_length(&self) -> u32 {
        1
    }
}

impl ConstByteLength for RegionKind {
    fn const_byte_length() -> u32 {
        1
    }
}

/// Identifies one synchronized resource: a tile coordinate or an entity id
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey(u64);

impl ResourceKey {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Pack a tile coordinate, x in the high half and y in the low half
    pub fn tile(x: i32, y: i32) -> Self {
        Self(((x as u32 as u64) << 32) | (y as u32 as u64))
    }

    pub fn entity(id: u64) -> Self {
        Self(id)
    }

    pub fn tile_coords(&self) -> (i32, i32) {
        ((self.0 >> 32) as u32 as i32, self.0 as u32 as i32)
    }

    pub fn to_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (x, y) = self.tile_coords();
        write!(f, "{:#x} ({}, {})", self.0, x, y)
    }
}

impl Serde for ResourceKey {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.0.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self(u64::de(reader)?))
    }

    fn byte_length(&self) -> u32 {
        8
    }
}

impl ConstByteLength for ResourceKey {
    fn const_byte_length() -> u32 {
        8
    }
}

/// Inclusive rectangle in resource-local cell coordinates
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Bounds {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl Bounds {
    /// Corners may be given in any order
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self {
            min_x: x0.min(x1),
            min_y: y0.min(y1),
            max_x: x0.max(x1),
            max_y: y0.max(y1),
        }
    }

    pub fn cell(x: i32, y: i32) -> Self {
        Self::new(x, y, x, y)
    }

    /// A `width` x `height` rectangle starting at (`x`, `y`)
    pub fn from_origin(x: i32, y: i32, width: u32, height: u32) -> Self {
        let max_x = x.saturating_add(width.saturating_sub(1) as i32);
        let max_y = y.saturating_add(height.saturating_sub(1) as i32);
        Self::new(x, y, max_x, max_y)
    }

    pub fn width(&self) -> u64 {
        (self.max_x as i64 - self.min_x as i64 + 1) as u64
    }

    pub fn height(&self) -> u64 {
        (self.max_y as i64 - self.min_y as i64 + 1) as u64
    }

    pub fn area(&self) -> u64 {
        self.width() * self.height()
    }

    /// Inclusive intersection test: touching edges overlap
    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub fn contains(&self, other: &Bounds) -> bool {
        self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && self.max_x >= other.max_x
            && self.max_y >= other.max_y
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

impl Serde for Bounds {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.min_x.ser(writer);
        self.min_y.ser(writer);
        self.max_x.ser(writer);
        self.max_y.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let min_x = i32::de(reader)?;
        let min_y = i32::de(reader)?;
        let max_x = i32::de(reader)?;
        let max_y = i32::de(reader)?;
        if min_x > max_x || min_y > max_y {
            return Err(SerdeErr);
        }
        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    fn byte_length(&self) -> u32 {
        16
    }
}

impl ConstByteLength for Bounds {
    fn const_byte_length() -> u32 {
        16
    }
}
