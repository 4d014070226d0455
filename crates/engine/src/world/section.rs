use super::block::BlockDescriptor;

/// Number of blocks along each axis of a sub-volume.
pub const SECTION_SIZE: usize = 16;
/// Total position count in one sub-volume.
pub const SECTION_VOLUME: usize = SECTION_SIZE * SECTION_SIZE * SECTION_SIZE;

/// Palette slot per local index, in the encodings a decoder can hand over.
///
/// Packed data is resolved one index at a time; nothing is unpacked up front,
/// so a sub-volume the palette filter rejects costs nothing beyond its palette.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackedIndices {
    /// No index array: every position is slot 0.
    Uniform,
    /// Bit-packed longs. `spanning` entries may straddle two longs (pre-1.16
    /// layout); otherwise each long holds `64 / bits` entries and the rest is
    /// padding.
    Packed {
        data: Vec<i64>,
        bits: usize,
        spanning: bool,
    },
    /// Already-expanded slots, one per local index.
    Slots(Box<[u16]>),
}

impl PackedIndices {
    pub fn resolve(&self, index: usize) -> usize {
        match self {
            PackedIndices::Uniform => 0,
            PackedIndices::Slots(slots) => slots.get(index).copied().unwrap_or(0) as usize,
            PackedIndices::Packed { data, bits, spanning } => {
                let bits = *bits;
                let mask = (1u64 << bits) - 1;
                if *spanning {
                    let bit = index * bits;
                    let long_idx = bit / 64;
                    let offset = bit % 64;
                    let Some(&low) = data.get(long_idx) else {
                        return 0;
                    };
                    let mut value = (low as u64) >> offset;
                    if offset + bits > 64 {
                        if let Some(&high) = data.get(long_idx + 1) {
                            value |= (high as u64) << (64 - offset);
                        }
                    }
                    (value & mask) as usize
                } else {
                    let entries_per_long = 64 / bits;
                    let long_idx = index / entries_per_long;
                    let offset = (index % entries_per_long) * bits;
                    match data.get(long_idx) {
                        Some(&long) => (((long as u64) >> offset) & mask) as usize,
                        None => 0,
                    }
                }
            }
        }
    }
}

/// A 16x16x16 cube described by a palette and an index function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PalettedSection {
    pub y: i32,
    pub palette: Vec<BlockDescriptor>,
    pub indices: PackedIndices,
}

impl PalettedSection {
    /// A sub-volume filled with one block.
    pub fn uniform(y: i32, block: BlockDescriptor) -> Self {
        Self {
            y,
            palette: vec![block],
            indices: PackedIndices::Uniform,
        }
    }

    /// Build from explicit per-index slots (`slots.len()` should be 4096).
    pub fn from_slots(y: i32, palette: Vec<BlockDescriptor>, slots: &[u16]) -> Self {
        let indices = if palette.len() <= 1 {
            PackedIndices::Uniform
        } else {
            PackedIndices::Slots(slots.into())
        };
        Self { y, palette, indices }
    }

    /// Build from an Anvil-style packed long array. A missing or empty array
    /// means the section is uniform (slot 0).
    pub fn packed(y: i32, palette: Vec<BlockDescriptor>, data: Option<Vec<i64>>, spanning: bool) -> Self {
        let indices = match data {
            Some(data) if palette.len() > 1 && !data.is_empty() => PackedIndices::Packed {
                bits: bits_per_entry(palette.len()),
                data,
                spanning,
            },
            _ => PackedIndices::Uniform,
        };
        Self { y, palette, indices }
    }
}

/// Narrowest index width Anvil writes.
pub const MIN_BITS_PER_ENTRY: usize = 4;

/// Width of one packed index for a palette of `palette_len` entries.
pub fn bits_per_entry(palette_len: usize) -> usize {
    let needed = palette_len
        .saturating_sub(1)
        .checked_ilog2()
        .map_or(0, |log| log as usize + 1);
    needed.max(MIN_BITS_PER_ENTRY)
}
