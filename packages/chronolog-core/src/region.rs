//! Integer coordinates and axis-aligned regions within a named world.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LogError;

/// Edge length of a chunk column used for spatial bucketing.
pub const CHUNK_SIZE: i32 = 16;
const CHUNK_SHIFT: u32 = 4;

/// Integer cell coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Chunk column containing this position.
    pub fn chunk(&self) -> ChunkKey {
        ChunkKey {
            x: self.x >> CHUNK_SHIFT,
            z: self.z >> CHUNK_SHIFT,
        }
    }

    fn component_min(self, other: BlockPos) -> BlockPos {
        BlockPos::new(
            self.x.min(other.x),
            self.y.min(other.y),
            self.z.min(other.z),
        )
    }

    fn component_max(self, other: BlockPos) -> BlockPos {
        BlockPos::new(
            self.x.max(other.x),
            self.y.max(other.y),
            self.z.max(other.z),
        )
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Parses `x,y,z` (whitespace around components is ignored).
impl FromStr for BlockPos {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(LogError::InvalidRegion(format!(
                "expected 'x,y,z', got '{}'",
                s
            )));
        }
        let parse = |part: &str| {
            part.parse::<i32>()
                .map_err(|e| LogError::InvalidRegion(format!("bad coordinate '{}': {}", part, e)))
        };
        Ok(BlockPos::new(parse(parts[0])?, parse(parts[1])?, parse(parts[2])?))
    }
}

/// Column of `CHUNK_SIZE` x `CHUNK_SIZE` cells spanning the full height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    pub x: i32,
    pub z: i32,
}

/// Axis-aligned bounding box over inclusive integer bounds in one world.
///
/// Always well-formed: `min` is component-wise less than or equal to `max`,
/// including when deserialized from corners in any order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RegionBounds")]
pub struct Region {
    world: String,
    min: BlockPos,
    max: BlockPos,
}

/// Serialized form of a [`Region`]; corners are normalized on conversion.
#[derive(Deserialize)]
struct RegionBounds {
    world: String,
    min: BlockPos,
    max: BlockPos,
}

impl From<RegionBounds> for Region {
    fn from(bounds: RegionBounds) -> Self {
        Region::new(bounds.world, bounds.min, bounds.max)
    }
}

impl Region {
    /// Creates a region spanning two arbitrary corners.
    pub fn new(world: impl Into<String>, a: BlockPos, b: BlockPos) -> Self {
        Self {
            world: world.into(),
            min: a.component_min(b),
            max: a.component_max(b),
        }
    }

    /// Region covering exactly one cell.
    pub fn point(world: impl Into<String>, pos: BlockPos) -> Self {
        Self::new(world, pos, pos)
    }

    /// Cube of side `2 * radius + 1` centred on `center`.
    pub fn around(world: impl Into<String>, center: BlockPos, radius: u32) -> Self {
        let r = radius.min(i32::MAX as u32) as i32;
        Self::new(
            world,
            BlockPos::new(
                center.x.saturating_sub(r),
                center.y.saturating_sub(r),
                center.z.saturating_sub(r),
            ),
            BlockPos::new(
                center.x.saturating_add(r),
                center.y.saturating_add(r),
                center.z.saturating_add(r),
            ),
        )
    }

    pub fn world(&self) -> &str {
        &self.world
    }

    pub fn min(&self) -> BlockPos {
        self.min
    }

    pub fn max(&self) -> BlockPos {
        self.max
    }

    /// Returns `true` if `pos` in `world` lies within the inclusive bounds.
    pub fn contains(&self, world: &str, pos: BlockPos) -> bool {
        self.world == world && self.contains_pos(pos)
    }

    /// Bounds check ignoring the world.
    pub fn contains_pos(&self, pos: BlockPos) -> bool {
        (self.min.x..=self.max.x).contains(&pos.x)
            && (self.min.y..=self.max.y).contains(&pos.y)
            && (self.min.z..=self.max.z).contains(&pos.z)
    }

    /// Inclusive overlap on all three axes. Regions in different worlds never intersect.
    pub fn intersects(&self, other: &Region) -> bool {
        self.world == other.world
            && self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
            && self.min.z <= other.max.z
            && other.min.z <= self.max.z
    }

    /// Number of cells covered.
    pub fn volume(&self) -> u64 {
        let span = |lo: i32, hi: i32| (hi as i64 - lo as i64 + 1) as u64;
        span(self.min.x, self.max.x)
            .saturating_mul(span(self.min.y, self.max.y))
            .saturating_mul(span(self.min.z, self.max.z))
    }

    /// Number of chunk columns the region touches.
    pub fn chunk_count(&self) -> u64 {
        let (lo, hi) = (self.min.chunk(), self.max.chunk());
        (hi.x as i64 - lo.x as i64 + 1) as u64 * (hi.z as i64 - lo.z as i64 + 1) as u64
    }

    /// Chunk columns the region touches, in x-major order.
    pub fn chunks(&self) -> impl Iterator<Item = ChunkKey> {
        let (lo, hi) = (self.min.chunk(), self.max.chunk());
        (lo.x..=hi.x).flat_map(move |x| (lo.z..=hi.z).map(move |z| ChunkKey { x, z }))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{} -> {}]", self.world, self.min, self.max)
    }
}
