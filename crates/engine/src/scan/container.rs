use crate::palette::{SlotMask, may_contain};
use crate::source::{ContainerHandle, ContainerRef, SubVolume};
use crate::target::TargetSet;
use crate::world::coords;
use crate::world::position::{CONTAINER_CHUNKS, CONTAINER_SPAN, ChunkPos, WorldAddress};
use crate::world::section::SECTION_VOLUME;

use super::BlockMatch;
use super::stats::ScanStats;

/// Lazily walks one open container: chunk grid in z-major order, sub-volumes
/// bottom to top, local indices in storage order.
///
/// Holds at most one decoded chunk. Positions are resolved one at a time and
/// only in sub-volumes whose palette names a target.
pub struct ContainerMatches<'a, H: ContainerHandle> {
    handle: H,
    container: &'a ContainerRef,
    targets: &'a TargetSet,
    stats: &'a ScanStats,
    next_slot: usize,
    chunk: Option<ChunkMatches<H::Section>>,
}

impl<'a, H: ContainerHandle> ContainerMatches<'a, H> {
    pub fn new(handle: H, container: &'a ContainerRef, targets: &'a TargetSet, stats: &'a ScanStats) -> Self {
        Self {
            handle,
            container,
            targets,
            stats,
            next_slot: 0,
            chunk: None,
        }
    }
}

impl<H: ContainerHandle> Iterator for ContainerMatches<'_, H> {
    type Item = BlockMatch;

    fn next(&mut self) -> Option<BlockMatch> {
        loop {
            if let Some(chunk) = &mut self.chunk {
                if let Some(m) = chunk.next_match(self.container, self.targets, self.stats) {
                    return Some(m);
                }
                self.chunk = None;
            }

            if self.next_slot >= CONTAINER_CHUNKS {
                return None;
            }
            let slot = self.next_slot;
            self.next_slot += 1;

            let local_x = (slot % CONTAINER_SPAN as usize) as u8;
            let local_z = (slot / CONTAINER_SPAN as usize) as u8;
            // The scanner never opens a container that is not addressable.
            let Some(chunk_pos) = self.container.pos.chunk_at(local_x, local_z) else {
                return None;
            };

            match self.handle.decode_chunk(local_x, local_z) {
                Ok(Some(sections)) => {
                    self.stats.chunk_decoded();
                    self.chunk = Some(ChunkMatches::new(chunk_pos, sections));
                }
                Ok(None) => self.stats.chunk_absent(),
                Err(err) => {
                    self.stats.chunk_skipped();
                    tracing::warn!(
                        "Skipping chunk ({}, {}) in {} of {}: {}",
                        chunk_pos.x,
                        chunk_pos.z,
                        self.container.pos,
                        self.container.dimension,
                        err,
                    );
                }
            }
        }
    }
}

/// Cursor over one decoded chunk.
struct ChunkMatches<S> {
    chunk: ChunkPos,
    sections: Vec<S>,
    current: usize,
    mask: Option<SlotMask>,
    next_index: usize,
}

impl<S: SubVolume> ChunkMatches<S> {
    fn new(chunk: ChunkPos, mut sections: Vec<S>) -> Self {
        sections.sort_by_key(|s| s.section_y());
        Self {
            chunk,
            sections,
            current: 0,
            mask: None,
            next_index: 0,
        }
    }

    fn next_match(&mut self, container: &ContainerRef, targets: &TargetSet, stats: &ScanStats) -> Option<BlockMatch> {
        while self.current < self.sections.len() {
            let section = &self.sections[self.current];

            if self.mask.is_none() {
                let pass = may_contain(section.palette(), targets);
                stats.section_examined(!pass);
                if !pass {
                    self.current += 1;
                    continue;
                }
                self.mask = Some(SlotMask::new(section.palette(), targets));
                self.next_index = 0;
            }

            if let Some(mask) = &self.mask {
                while self.next_index < SECTION_VOLUME {
                    let index = self.next_index;
                    self.next_index += 1;

                    let slot = section.resolve(index);
                    let Some(block) = mask.hit(slot) else {
                        continue;
                    };
                    stats.matched();
                    return Some(BlockMatch {
                        address: WorldAddress::new(
                            container.dimension.clone(),
                            coords::world_pos(self.chunk, i64::from(section.section_y()), index),
                        ),
                        block: block.clone(),
                        properties: section.palette()[slot].properties.clone(),
                        container: container.pos,
                    });
                }
            }

            self.mask = None;
            self.current += 1;
        }
        None
    }
}
