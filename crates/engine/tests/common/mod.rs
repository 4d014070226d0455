//! In-memory world source for scanner tests. Every sub-volume counts how many
//! times its positions were resolved.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use blockscan_engine::error::DecodeError;
use blockscan_engine::scan::CancelToken;
use blockscan_engine::source::{ContainerHandle, ContainerRef, SubVolume, WorldSource};
use blockscan_engine::world::coords::linear_index_of;
use blockscan_engine::world::section::{SECTION_SIZE, SECTION_VOLUME};
use blockscan_engine::world::{BlockDescriptor, BlockPos, ContainerPos, Dimension, PalettedSection};

#[derive(Clone)]
pub struct MockSection {
    inner: PalettedSection,
    pub resolves: Arc<AtomicUsize>,
}

impl MockSection {
    pub fn new(inner: PalettedSection) -> Self {
        Self {
            inner,
            resolves: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn resolve_count(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }
}

impl SubVolume for MockSection {
    fn section_y(&self) -> i32 {
        self.inner.y
    }

    fn palette(&self) -> &[BlockDescriptor] {
        &self.inner.palette
    }

    fn resolve(&self, local_index: usize) -> usize {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        self.inner.indices.resolve(local_index)
    }
}

#[derive(Clone)]
pub enum MockChunk {
    Sections(Vec<MockSection>),
    Corrupt,
}

#[derive(Clone, Default)]
pub struct MockContainer {
    chunks: HashMap<(u8, u8), MockChunk>,
}

impl MockContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk(mut self, local_x: u8, local_z: u8, sections: Vec<MockSection>) -> Self {
        self.chunks.insert((local_x, local_z), MockChunk::Sections(sections));
        self
    }

    pub fn with_corrupt_chunk(mut self, local_x: u8, local_z: u8) -> Self {
        self.chunks.insert((local_x, local_z), MockChunk::Corrupt);
        self
    }
}

impl ContainerHandle for MockContainer {
    type Section = MockSection;

    fn decode_chunk(&mut self, local_x: u8, local_z: u8) -> Result<Option<Vec<MockSection>>, DecodeError> {
        match self.chunks.get(&(local_x, local_z)) {
            None => Ok(None),
            Some(MockChunk::Sections(sections)) => Ok(Some(sections.clone())),
            Some(MockChunk::Corrupt) => Err(DecodeError::corrupt(
                format!("chunk ({local_x}, {local_z})"),
                "truncated compressed stream",
            )),
        }
    }
}

/// `None` entries are listed but absent when opened.
#[derive(Default)]
pub struct MockWorld {
    dimensions: Vec<Dimension>,
    containers: BTreeMap<ContainerRef, Option<MockContainer>>,
    pub opened: AtomicUsize,
    /// Trips the token when the n-th container is opened.
    cancel_on: Option<(CancelToken, usize)>,
}

impl MockWorld {
    pub fn new() -> Self {
        Self {
            dimensions: vec![Dimension::overworld()],
            ..Self::default()
        }
    }

    pub fn with_dimension(mut self, dimension: Dimension) -> Self {
        if !self.dimensions.contains(&dimension) {
            self.dimensions.push(dimension);
        }
        self
    }

    pub fn with_container(mut self, dimension: Dimension, pos: ContainerPos, container: MockContainer) -> Self {
        self.containers.insert(ContainerRef::new(dimension, pos), Some(container));
        self
    }

    pub fn with_absent_container(mut self, dimension: Dimension, pos: ContainerPos) -> Self {
        self.containers.insert(ContainerRef::new(dimension, pos), None);
        self
    }

    pub fn cancel_on_open(mut self, cancel: CancelToken, nth: usize) -> Self {
        self.cancel_on = Some((cancel, nth));
        self
    }
}

impl WorldSource for MockWorld {
    type Container = MockContainer;

    fn dimensions(&self) -> Vec<Dimension> {
        self.dimensions.clone()
    }

    fn list_containers(&self, dimension: &Dimension) -> Result<Vec<ContainerRef>, DecodeError> {
        Ok(self
            .containers
            .keys()
            .filter(|c| &c.dimension == dimension)
            .cloned()
            .collect())
    }

    fn open_container(&self, container: &ContainerRef) -> Result<Option<MockContainer>, DecodeError> {
        let opened = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((cancel, nth)) = &self.cancel_on {
            if opened == *nth {
                cancel.cancel();
            }
        }
        Ok(self.containers.get(container).cloned().flatten())
    }
}

// ---------------------------------------------------------------------------
// Section builders
// ---------------------------------------------------------------------------

pub fn uniform(y: i32, name: &str) -> MockSection {
    MockSection::new(PalettedSection::uniform(y, BlockDescriptor::new(name)))
}

/// `fill` everywhere except `placed`, given as (local x, y, z, block).
pub fn with_blocks(y: i32, fill: &str, placed: &[(usize, usize, usize, BlockDescriptor)]) -> MockSection {
    let mut palette = vec![BlockDescriptor::new(fill)];
    let mut slots = vec![0u16; SECTION_VOLUME];
    for (x, ly, z, block) in placed {
        let slot = match palette.iter().position(|p| p == block) {
            Some(slot) => slot,
            None => {
                palette.push(block.clone());
                palette.len() - 1
            }
        };
        slots[linear_index_of(*x, *ly, *z, SECTION_SIZE)] = slot as u16;
    }
    MockSection::new(PalettedSection::from_slots(y, palette, &slots))
}

/// Cycles through `names` over the whole section.
pub fn mixed(y: i32, names: &[&str]) -> MockSection {
    let palette: Vec<BlockDescriptor> = names.iter().map(BlockDescriptor::new).collect();
    let slots: Vec<u16> = (0..SECTION_VOLUME).map(|i| (i % names.len()) as u16).collect();
    MockSection::new(PalettedSection::from_slots(y, palette, &slots))
}

pub fn positions(matches: &[blockscan_engine::BlockMatch]) -> Vec<BlockPos> {
    matches.iter().map(|m| m.pos()).collect()
}
