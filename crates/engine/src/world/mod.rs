//! The storage hierarchy's vocabulary: positions, block descriptors, paletted
//! sub-volumes, and the coordinate transforms between them.

pub mod block;
pub mod coords;
pub mod position;
pub mod section;

pub use block::BlockDescriptor;
pub use position::{Axis, BlockPos, ChunkPos, ContainerPos, Dimension, WorldAddress};
pub use section::{PackedIndices, PalettedSection};
