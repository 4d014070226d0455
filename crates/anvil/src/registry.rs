//! Vanilla block names, used to expand `*` target patterns.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use azalea_block::{BlockState, BlockTrait};

/// Every vanilla block type name (`minecraft:stone`, ...), built once from the
/// block state registry.
static VANILLA_BLOCKS: LazyLock<BTreeSet<String>> = LazyLock::new(|| {
    let mut names = BTreeSet::new();
    for id in 0..=BlockState::MAX_STATE {
        let Ok(state) = BlockState::try_from(id as u32) else {
            continue;
        };
        let block: Box<dyn BlockTrait> = Box::<dyn BlockTrait>::from(state);
        names.insert(format!("minecraft:{}", block.id()));
    }
    tracing::debug!("Block registry: {} vanilla block types", names.len());
    names
});

pub fn vanilla_block_names() -> &'static BTreeSet<String> {
    &VANILLA_BLOCKS
}
