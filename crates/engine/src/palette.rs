//! Palette-level filtering.
//!
//! A sub-volume's palette lists every distinct block it contains. If none of
//! those is a target, the 4096 positions behind it are never looked at.

use std::sync::Arc;

use crate::target::TargetSet;
use crate::world::block::BlockDescriptor;

/// True iff at least one palette entry is a target. O(palette size).
pub fn may_contain(palette: &[BlockDescriptor], targets: &TargetSet) -> bool {
    palette.iter().any(|entry| targets.contains(&entry.name))
}

/// Per-slot target lookup for one palette, computed once per sub-volume so the
/// per-position check is a single index.
#[derive(Debug, Clone)]
pub struct SlotMask {
    slots: Vec<Option<Arc<str>>>,
}

impl SlotMask {
    pub fn new(palette: &[BlockDescriptor], targets: &TargetSet) -> Self {
        Self {
            slots: palette
                .iter()
                .map(|entry| targets.get(&entry.name).cloned())
                .collect(),
        }
    }

    /// The target name at `slot`, if that slot is a target. Out-of-range slots
    /// (corrupt index data) are never hits.
    #[inline]
    pub fn hit(&self, slot: usize) -> Option<&Arc<str>> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn any(&self) -> bool {
        self.slots.iter().any(Option::is_some)
    }
}
