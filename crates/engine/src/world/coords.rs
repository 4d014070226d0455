//! Conversions between world coordinates and the storage hierarchy
//! (container -> chunk -> sub-volume -> local offset).
//!
//! Every division here is Euclidean: `-1` belongs to chunk `-1`, never to
//! chunk `0`. Sizes and spans must be positive.

use super::position::{BlockPos, CHUNK_SIZE, ChunkPos, ContainerPos};
use super::section::SECTION_SIZE;

/// Container holding a world column, for an arbitrary container span (in
/// chunks) and chunk size (in blocks).
pub fn container_of(world_x: i64, world_z: i64, span_chunks: i64, chunk_size: i64) -> ContainerPos {
    let span_blocks = span_chunks * chunk_size;
    ContainerPos::new(world_x.div_euclid(span_blocks), world_z.div_euclid(span_blocks))
}

/// Minimum-corner world column of a container. Inverse of [`container_of`].
pub fn container_origin(container: ContainerPos, span_chunks: i64, chunk_size: i64) -> (i64, i64) {
    let span_blocks = span_chunks * chunk_size;
    (container.x * span_blocks, container.z * span_blocks)
}

pub fn chunk_of(world_x: i64, world_z: i64) -> ChunkPos {
    ChunkPos::new(world_x.div_euclid(CHUNK_SIZE), world_z.div_euclid(CHUNK_SIZE))
}

/// Minimum-corner world column of a chunk. Inverse of [`chunk_of`].
pub fn chunk_origin(chunk: ChunkPos) -> (i64, i64) {
    (chunk.x * CHUNK_SIZE, chunk.z * CHUNK_SIZE)
}

/// Vertical sub-volume index holding world height `y`.
pub fn section_of(y: i64) -> i64 {
    y.div_euclid(SECTION_SIZE as i64)
}

/// Offset of a world coordinate inside its sub-volume (0..size).
pub fn local_offset_of(world_coord: i64, size: i64) -> i64 {
    world_coord.rem_euclid(size)
}

/// Flat index of a local position: y major, then z, x minor.
///
/// This is the order in which Anvil stores block states.
#[inline]
pub const fn linear_index_of(x: usize, y: usize, z: usize, size: usize) -> usize {
    (y * size + z) * size + x
}

/// Inverse of [`linear_index_of`], returns `(x, y, z)`.
#[inline]
pub const fn coords_of_index(index: usize, size: usize) -> (usize, usize, usize) {
    (index % size, index / (size * size), (index / size) % size)
}

/// World position of a local index inside sub-volume `section_y` of `chunk`.
pub fn world_pos(chunk: ChunkPos, section_y: i64, index: usize) -> BlockPos {
    let (lx, ly, lz) = coords_of_index(index, SECTION_SIZE);
    let (ox, oz) = chunk_origin(chunk);
    BlockPos::new(
        ox + lx as i64,
        section_y * SECTION_SIZE as i64 + ly as i64,
        oz + lz as i64,
    )
}

/// Split a world position into (chunk, section index, local index).
pub fn locate(pos: BlockPos) -> (ChunkPos, i64, usize) {
    let size = SECTION_SIZE as i64;
    let index = linear_index_of(
        local_offset_of(pos.x, size) as usize,
        local_offset_of(pos.y, size) as usize,
        local_offset_of(pos.z, size) as usize,
        SECTION_SIZE,
    );
    (pos.chunk(), pos.section_y(), index)
}
