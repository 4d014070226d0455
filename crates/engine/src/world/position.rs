use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::coords;

/// Number of blocks along each horizontal axis of a chunk.
pub const CHUNK_SIZE: i64 = 16;
/// Number of chunks along each horizontal axis of a container (region file).
pub const CONTAINER_SPAN: i64 = 32;
/// Chunk slots in one container grid.
pub const CONTAINER_CHUNKS: usize = (CONTAINER_SPAN * CONTAINER_SPAN) as usize;

/// Absolute block position in one dimension.
///
/// Ordered by (x, y, z) so that sorted output is deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl BlockPos {
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// The chunk column this block belongs to.
    pub fn chunk(&self) -> ChunkPos {
        coords::chunk_of(self.x, self.z)
    }

    /// Vertical index of the sub-volume holding this block.
    pub fn section_y(&self) -> i64 {
        coords::section_of(self.y)
    }

    pub const fn offset(&self, axis: Axis, delta: i64) -> BlockPos {
        match axis {
            Axis::X => Self::new(self.x + delta, self.y, self.z),
            Axis::Y => Self::new(self.x, self.y + delta, self.z),
            Axis::Z => Self::new(self.x, self.y, self.z + delta),
        }
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Chunk column position (each chunk is 16x16 blocks horizontally).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i64,
    pub z: i64,
}

impl ChunkPos {
    pub const fn new(x: i64, z: i64) -> Self {
        Self { x, z }
    }

    /// The container whose grid holds this chunk.
    pub const fn container(&self) -> ContainerPos {
        ContainerPos::of_chunk(*self)
    }

    /// Position inside the owning container's grid (0..32 each axis).
    pub const fn local_in_container(&self) -> (u8, u8) {
        (
            self.x.rem_euclid(CONTAINER_SPAN) as u8,
            self.z.rem_euclid(CONTAINER_SPAN) as u8,
        )
    }
}

/// Container (region file) position, 32x32 chunks each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerPos {
    pub x: i64,
    pub z: i64,
}

impl ContainerPos {
    pub const fn new(x: i64, z: i64) -> Self {
        Self { x, z }
    }

    pub const fn of_chunk(chunk: ChunkPos) -> Self {
        Self {
            x: chunk.x.div_euclid(CONTAINER_SPAN),
            z: chunk.z.div_euclid(CONTAINER_SPAN),
        }
    }

    /// World chunk at a local grid slot of this container. `None` when the
    /// container is not [addressable](Self::is_addressable).
    pub fn chunk_at(&self, local_x: u8, local_z: u8) -> Option<ChunkPos> {
        if !self.is_addressable() {
            return None;
        }
        Some(ChunkPos::new(
            self.x * CONTAINER_SPAN + i64::from(local_x),
            self.z * CONTAINER_SPAN + i64::from(local_z),
        ))
    }

    /// Whether every block column of this container has an `i64` world
    /// coordinate. Always true for containers computed from a block position;
    /// a stray region file name can violate it.
    pub fn is_addressable(&self) -> bool {
        let span = CONTAINER_SPAN * CHUNK_SIZE;
        let fits = |c: i64| c.checked_mul(span).and_then(|origin| origin.checked_add(span - 1)).is_some();
        fits(self.x) && fits(self.z)
    }

    /// Region file name in the Anvil naming scheme.
    pub fn file_name(&self) -> String {
        format!("r.{}.{}.mca", self.x, self.z)
    }
}

impl fmt::Display for ContainerPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r.{}.{}", self.x, self.z)
    }
}

/// One of the three world axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn parse(label: &str) -> Option<Axis> {
        match label {
            "x" | "X" => Some(Axis::X),
            "y" | "Y" => Some(Axis::Y),
            "z" | "Z" => Some(Axis::Z),
            _ => None,
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

/// Opaque dimension identifier (`minecraft:overworld`, a modded id, ...).
///
/// Cheap to clone: every match carries one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dimension(Arc<str>);

impl Dimension {
    pub const OVERWORLD: &'static str = "minecraft:overworld";
    pub const NETHER: &'static str = "minecraft:the_nether";
    pub const END: &'static str = "minecraft:the_end";

    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn overworld() -> Self {
        Self::new(Self::OVERWORLD)
    }

    pub fn nether() -> Self {
        Self::new(Self::NETHER)
    }

    pub fn end() -> Self {
        Self::new(Self::END)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A block position qualified by its dimension.
///
/// Field order gives the (dimension, x, y, z) total order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorldAddress {
    pub dimension: Dimension,
    #[serde(flatten)]
    pub pos: BlockPos,
}

impl WorldAddress {
    pub fn new(dimension: Dimension, pos: BlockPos) -> Self {
        Self { dimension, pos }
    }
}

impl fmt::Display for WorldAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.dimension, self.pos)
    }
}
