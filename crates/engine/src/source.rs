//! The narrow interface to whatever decodes the on-disk world.
//!
//! The engine never parses files. A [`WorldSource`] lists and opens
//! containers; a [`ContainerHandle`] decodes one chunk at a time into
//! sub-volumes. Releasing a handle is `Drop`.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::world::block::BlockDescriptor;
use crate::world::position::{ContainerPos, Dimension};
use crate::world::section::PalettedSection;

/// A container (region file) within one dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerRef {
    pub dimension: Dimension,
    pub pos: ContainerPos,
}

impl ContainerRef {
    pub fn new(dimension: Dimension, pos: ContainerPos) -> Self {
        Self { dimension, pos }
    }
}

/// One decoded sub-volume.
pub trait SubVolume {
    /// Vertical index (world y = `section_y * 16 + local y`).
    fn section_y(&self) -> i32;

    fn palette(&self) -> &[BlockDescriptor];

    /// Palette slot at a local index (see `coords::linear_index_of`).
    fn resolve(&self, local_index: usize) -> usize;
}

impl SubVolume for PalettedSection {
    fn section_y(&self) -> i32 {
        self.y
    }

    fn palette(&self) -> &[BlockDescriptor] {
        &self.palette
    }

    fn resolve(&self, local_index: usize) -> usize {
        self.indices.resolve(local_index)
    }
}

/// An open container.
pub trait ContainerHandle {
    type Section: SubVolume;

    /// Decode the chunk at a local grid slot (0..32 each axis).
    ///
    /// `Ok(None)` means the chunk was never generated.
    fn decode_chunk(&mut self, local_x: u8, local_z: u8) -> Result<Option<Vec<Self::Section>>, DecodeError>;
}

/// A world made of containers, shared read-only across scan workers.
pub trait WorldSource: Sync {
    type Container: ContainerHandle;

    /// Dimensions this source can be asked about.
    fn dimensions(&self) -> Vec<Dimension>;

    fn list_containers(&self, dimension: &Dimension) -> Result<Vec<ContainerRef>, DecodeError>;

    /// `Ok(None)` means the container does not exist or holds no chunks.
    fn open_container(&self, container: &ContainerRef) -> Result<Option<Self::Container>, DecodeError>;
}
