//! Persistent block index: every target type mapped to (up to a cap of) its
//! positions, plus the uncapped true count.
//!
//! On disk an index is a directory holding
//! - `positions.jsonl`: one [`IndexRow`] per line, unique on
//!   (type, dimension, x, y, z);
//! - `summary.json`: the cap and one [`IndexedType`] per type.
//!
//! [`BlockIndexStore`] builds an index during a scan; [`BlockIndex`] is the
//! read path for queries afterwards.

mod arena;
pub mod reader;
pub mod store;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::scan::BlockMatch;
use crate::target::Pattern;
use crate::world::position::{BlockPos, ContainerPos, Dimension, WorldAddress};

pub use reader::BlockIndex;
pub use store::BlockIndexStore;

pub const POSITIONS_FILE: &str = "positions.jsonl";
pub const SUMMARY_FILE: &str = "summary.json";

/// Bounds storage for ubiquitous types (stone, deepslate) while rare ones stay
/// complete.
pub const DEFAULT_CAP: usize = 10_000;
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Exact name or `*` pattern (`minecraft:*_ore`, `nether_*`).
pub type TypeQuery = Pattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOptions {
    /// Maximum persisted positions per block type.
    pub cap: usize,
    /// Rows buffered before each durable write.
    pub batch_size: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            cap: DEFAULT_CAP,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl IndexOptions {
    pub fn with_cap(cap: usize) -> Self {
        Self {
            cap,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cap == 0 {
            return Err(ConfigError::InvalidCap(0));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid {
                name: "batch_size",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Per-type totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedType {
    pub block: String,
    /// Every distinct observation, persisted or not.
    pub total: u64,
    pub persisted: u64,
    /// Set once an observation was dropped because the cap was full.
    pub cap_reached: bool,
}

/// A persisted position as returned by queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexedPosition {
    pub address: WorldAddress,
    pub block: Arc<str>,
}

/// One line of `positions.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRow {
    pub block: String,
    pub dimension: Dimension,
    pub x: i64,
    pub y: i64,
    pub z: i64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    pub container: ContainerPos,
}

impl IndexRow {
    pub fn from_match(found: &BlockMatch) -> Self {
        let pos = found.pos();
        Self {
            block: found.block.to_string(),
            dimension: found.dimension().clone(),
            x: pos.x,
            y: pos.y,
            z: pos.z,
            properties: found.properties.clone(),
            container: found.container,
        }
    }

    pub fn pos(&self) -> BlockPos {
        BlockPos::new(self.x, self.y, self.z)
    }

    pub fn position(&self) -> IndexedPosition {
        IndexedPosition {
            address: WorldAddress::new(self.dimension.clone(), self.pos()),
            block: Arc::from(self.block.as_str()),
        }
    }
}

/// Contents of `summary.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub cap: usize,
    pub types: Vec<IndexedType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lost: Vec<IndexedPosition>,
}

/// What closing a store achieved.
#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    pub dir: PathBuf,
    pub cap: usize,
    pub types: Vec<IndexedType>,
    /// Rows known to be on disk.
    pub durable_rows: u64,
    /// Positions accepted for persistence but never written.
    pub lost: Vec<IndexedPosition>,
    /// Set when a write failed; the index is then partial.
    pub failure: Option<String>,
}

impl IndexSummary {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    pub fn get(&self, block: &str) -> Option<&IndexedType> {
        self.types.iter().find(|t| t.block == block)
    }
}
