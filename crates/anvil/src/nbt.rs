//! Chunk NBT layouts and their conversion into engine sub-volumes.
//!
//! Two layouts are read:
//! - 1.18+: `sections[].block_states.{palette, data}` at the chunk root;
//! - 1.13 to 1.17: `Level.Sections[].{Palette, BlockStates}`.
//!
//! Older numeric-id sections carry no palette and are ignored.

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use serde::Deserialize;

use blockscan_engine::world::{BlockDescriptor, PalettedSection};

/// First DataVersion (20w17a) whose packed entries never straddle two longs.
pub const NON_SPANNING_SINCE: i32 = 2529;

// ── Chunk NBT structs (serde) ────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct ChunkNbt {
    #[serde(rename = "DataVersion", default)]
    data_version: i32,
    #[serde(default)]
    sections: Option<Vec<SectionNbt>>,
    #[serde(rename = "Level", default)]
    level: Option<LevelNbt>,
}

#[derive(Deserialize, Debug)]
struct SectionNbt {
    #[serde(rename = "Y")]
    y: i8,
    #[serde(default)]
    block_states: Option<BlockStatesNbt>,
}

#[derive(Deserialize, Debug)]
struct BlockStatesNbt {
    palette: Vec<PaletteEntry>,
    #[serde(default)]
    data: Option<fastnbt::LongArray>,
}

#[derive(Deserialize, Debug)]
struct LevelNbt {
    #[serde(rename = "Sections", default)]
    sections: Vec<LegacySectionNbt>,
}

#[derive(Deserialize, Debug)]
struct LegacySectionNbt {
    #[serde(rename = "Y")]
    y: i8,
    #[serde(rename = "Palette", default)]
    palette: Option<Vec<PaletteEntry>>,
    #[serde(rename = "BlockStates", default)]
    block_states: Option<fastnbt::LongArray>,
}

#[derive(Deserialize, Debug, Clone)]
struct PaletteEntry {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Properties", default)]
    properties: Option<HashMap<String, String>>,
}

impl PaletteEntry {
    fn into_descriptor(self) -> BlockDescriptor {
        BlockDescriptor {
            properties: self.properties.map(BTreeMap::from_iter).unwrap_or_default(),
            ..BlockDescriptor::new(self.name)
        }
    }
}

fn palette(entries: Vec<PaletteEntry>) -> Vec<BlockDescriptor> {
    entries.into_iter().map(PaletteEntry::into_descriptor).collect()
}

/// Decode one chunk's raw (decompressed) NBT into its sub-volumes.
///
/// Packed indices stay packed; they are read lazily during the scan.
pub fn decode_sections(bytes: &[u8]) -> Result<Vec<PalettedSection>> {
    let chunk: ChunkNbt = fastnbt::from_bytes(bytes).context("deserializing chunk NBT")?;
    let spanning = chunk.data_version < NON_SPANNING_SINCE;

    if let Some(sections) = chunk.sections {
        return Ok(sections
            .into_iter()
            .filter_map(|s| {
                let states = s.block_states?;
                Some(PalettedSection::packed(
                    s.y as i32,
                    palette(states.palette),
                    states.data.map(fastnbt::LongArray::into_inner),
                    spanning,
                ))
            })
            .collect());
    }

    let Some(level) = chunk.level else {
        return Ok(Vec::new());
    };
    Ok(level
        .sections
        .into_iter()
        .filter_map(|s| {
            let entries = s.palette?;
            Some(PalettedSection::packed(s.y as i32, palette(entries), s.block_states.map(fastnbt::LongArray::into_inner), spanning))
        })
        .collect())
}
