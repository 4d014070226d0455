//! Block finder engine.
//!
//! Scans a container-structured voxel world for a set of block types without
//! decoding sub-volumes that cannot hold them, groups matches into
//! structures, and keeps a capped persistent index of what it found. The
//! on-disk format lives behind [`source::WorldSource`].

pub mod cluster;
pub mod error;
pub mod index;
pub mod palette;
pub mod pipeline;
pub mod scan;
pub mod source;
pub mod target;
pub mod world;

pub use cluster::{Orientation, Structure, detect_structures};
pub use error::{ConfigError, DecodeError, IndexError};
pub use index::{BlockIndex, BlockIndexStore, IndexOptions, TypeQuery};
pub use pipeline::ScanSummary;
pub use scan::{BlockMatch, CancelToken, ScanOptions, ScanReport, Scanner};
pub use target::{Pattern, TargetSet};
pub use world::{BlockDescriptor, BlockPos, Dimension, WorldAddress};
