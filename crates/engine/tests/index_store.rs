//! Block index: cap enforcement, idempotence, concurrent observers, and the
//! on-disk round trip through `BlockIndex::open`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;

use blockscan_engine::error::{ConfigError, IndexError};
use blockscan_engine::index::{BlockIndex, BlockIndexStore, IndexOptions, POSITIONS_FILE, SUMMARY_FILE};
use blockscan_engine::scan::BlockMatch;
use blockscan_engine::target::Pattern;
use blockscan_engine::world::{BlockPos, Dimension, WorldAddress};

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("blockscan_index_{}_{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

fn found(block: &str, dimension: Dimension, x: i64, y: i64, z: i64) -> BlockMatch {
    let pos = BlockPos::new(x, y, z);
    BlockMatch {
        address: WorldAddress::new(dimension, pos),
        block: Arc::from(block),
        properties: BTreeMap::new(),
        container: pos.chunk().container(),
    }
}

fn ore(x: i64) -> BlockMatch {
    found("minecraft:diamond_ore", Dimension::overworld(), x, -58, 3)
}

fn types(names: &[&str]) -> Vec<Arc<str>> {
    names.iter().map(|n| Arc::from(*n)).collect()
}

// ---------------------------------------------------------------------------
// Cap and idempotence
// ---------------------------------------------------------------------------

#[test]
fn cap_bounds_persisted_rows_but_not_total() {
    let dir = scratch("cap");
    let store = BlockIndexStore::create(&dir, IndexOptions::with_cap(3), types(&["minecraft:diamond_ore"])).unwrap();

    let persisted: Vec<bool> = (0..5).map(|x| store.observe(&ore(x)).unwrap()).collect();
    assert_eq!(persisted, vec![true, true, true, false, false]);

    let live = store.query(&Pattern::new("diamond_ore"), None);
    assert_eq!(live.len(), 3);

    let summary = store.finish();
    assert!(summary.is_complete());
    assert_eq!(summary.durable_rows, 3);
    let stats = summary.get("minecraft:diamond_ore").unwrap();
    assert_eq!((stats.total, stats.persisted, stats.cap_reached), (5, 3, true));

    let index = BlockIndex::open(&dir).unwrap();
    assert!(index.is_complete());
    assert_eq!(index.cap(), 3);
    assert_eq!(index.query(&Pattern::new("diamond_ore"), None), live);
    let reread = index.get("minecraft:diamond_ore").unwrap();
    assert_eq!((reread.total, reread.persisted, reread.cap_reached), (5, 3, true));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn exactly_cap_matches_do_not_set_flag() {
    let dir = scratch("exact_cap");
    let store = BlockIndexStore::create(&dir, IndexOptions::with_cap(2), types(&["minecraft:diamond_ore"])).unwrap();
    store.observe(&ore(0)).unwrap();
    store.observe(&ore(1)).unwrap();

    let summary = store.finish();
    let stats = summary.get("minecraft:diamond_ore").unwrap();
    assert_eq!((stats.total, stats.persisted, stats.cap_reached), (2, 2, false));
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn observing_twice_changes_nothing() {
    let dir = scratch("idempotent");
    let store = BlockIndexStore::create(&dir, IndexOptions::default(), types(&["minecraft:diamond_ore"])).unwrap();

    assert!(store.observe(&ore(7)).unwrap());
    let before = store.summary();
    assert!(!store.observe(&ore(7)).unwrap());
    assert_eq!(store.summary(), before);
    assert_eq!(store.query(&Pattern::new("*"), None).len(), 1);

    store.finish();
    let index = BlockIndex::open(&dir).unwrap();
    assert_eq!(index.len(), 1);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn position_dropped_for_cap_is_counted_once() {
    let dir = scratch("capped_twice");
    let store = BlockIndexStore::create(&dir, IndexOptions::with_cap(1), types(&["minecraft:diamond_ore"])).unwrap();

    assert!(store.observe(&ore(0)).unwrap());
    assert!(!store.observe(&ore(1)).unwrap());
    let before = store.summary();
    assert!(!store.observe(&ore(1)).unwrap());
    assert!(!store.observe(&ore(0)).unwrap());
    assert_eq!(store.summary(), before);

    let summary = store.finish();
    let stats = summary.get("minecraft:diamond_ore").unwrap();
    assert_eq!((stats.total, stats.persisted, stats.cap_reached), (2, 1, true));
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn same_position_in_two_dimensions_is_two_rows() {
    let dir = scratch("dims");
    let store = BlockIndexStore::create(&dir, IndexOptions::default(), Vec::new()).unwrap();
    store.observe(&found("minecraft:obsidian", Dimension::overworld(), 1, 2, 3)).unwrap();
    store.observe(&found("minecraft:obsidian", Dimension::nether(), 1, 2, 3)).unwrap();

    let all = store.query(&Pattern::new("obsidian"), None);
    assert_eq!(all.len(), 2);
    let nether = store.query(&Pattern::new("obsidian"), Some(&Dimension::nether()));
    assert_eq!(nether.len(), 1);
    assert_eq!(nether[0].address.dimension, Dimension::nether());
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn zero_cap_is_a_config_error() {
    let dir = scratch("zero_cap");
    match BlockIndexStore::create(&dir, IndexOptions::with_cap(0), Vec::new()) {
        Err(IndexError::Config(err)) => assert_eq!(err, ConfigError::InvalidCap(0)),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("cap 0 accepted"),
    }
    fs::remove_dir_all(&dir).ok();
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[test]
fn wildcard_queries_and_ordering() {
    let dir = scratch("query");
    let store = BlockIndexStore::create(&dir, IndexOptions::default(), Vec::new()).unwrap();
    let overworld = Dimension::overworld();
    store.observe(&found("minecraft:diamond_ore", overworld.clone(), 40, -50, 0)).unwrap();
    store.observe(&found("minecraft:deepslate_diamond_ore", overworld.clone(), -3, -60, 9)).unwrap();
    store.observe(&found("minecraft:ancient_debris", Dimension::nether(), 5, 15, 5)).unwrap();
    store.observe(&found("minecraft:diamond_ore", overworld.clone(), -40, 12, 0)).unwrap();

    let diamonds = store.query(&Pattern::new("*diamond_ore"), None);
    let xs: Vec<i64> = diamonds.iter().map(|p| p.address.pos.x).collect();
    assert_eq!(xs, vec![-40, -3, 40]);

    assert_eq!(store.query(&Pattern::new("minecraft:ancient_*"), None).len(), 1);
    assert!(store.query(&Pattern::new("emerald_ore"), None).is_empty());
    assert!(store.query(&Pattern::new("ancient_debris"), Some(&overworld)).is_empty());

    let summary = store.finish();
    let names: Vec<&str> = summary.types.iter().map(|t| t.block.as_str()).collect();
    assert_eq!(
        names,
        vec!["minecraft:ancient_debris", "minecraft:deepslate_diamond_ore", "minecraft:diamond_ore"]
    );

    let index = BlockIndex::open(&dir).unwrap();
    let reopened: Vec<i64> = index
        .query(&Pattern::new("*diamond_ore"), Some(&overworld))
        .iter()
        .map(|p| p.address.pos.x)
        .collect();
    assert_eq!(reopened, xs);
    fs::remove_dir_all(&dir).ok();
}

// ---------------------------------------------------------------------------
// Concurrency and durability
// ---------------------------------------------------------------------------

#[test]
fn concurrent_observers_respect_cap() {
    let dir = scratch("concurrent");
    let options = IndexOptions {
        cap: 250,
        batch_size: 16,
    };
    let store = BlockIndexStore::create(&dir, options, types(&["minecraft:diamond_ore", "minecraft:coal_ore"])).unwrap();

    // Every position is observed twice, from different workers.
    (0..2000i64).into_par_iter().for_each(|i| {
        let x = i % 1000;
        let block = if x % 2 == 0 { "minecraft:diamond_ore" } else { "minecraft:coal_ore" };
        store.observe(&found(block, Dimension::overworld(), x, 0, 0)).unwrap();
    });

    let summary = store.finish();
    for name in ["minecraft:diamond_ore", "minecraft:coal_ore"] {
        let stats = summary.get(name).unwrap();
        assert_eq!(stats.persisted, 250, "{name}");
        assert!(stats.cap_reached, "{name}");
        assert_eq!(stats.total, 500, "{name}");
    }
    assert_eq!(summary.durable_rows, 500);

    let index = BlockIndex::open(&dir).unwrap();
    assert_eq!(index.len(), 500);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn dropped_store_still_flushes() {
    let dir = scratch("drop");
    {
        let store = BlockIndexStore::create(&dir, IndexOptions::default(), Vec::new()).unwrap();
        for x in 0..10 {
            store.observe(&ore(x)).unwrap();
        }
    }
    assert!(dir.join(SUMMARY_FILE).exists());
    let index = BlockIndex::open(&dir).unwrap();
    assert_eq!(index.len(), 10);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn create_truncates_previous_index() {
    let dir = scratch("rebuild");
    let store = BlockIndexStore::create(&dir, IndexOptions::default(), Vec::new()).unwrap();
    store.observe(&ore(1)).unwrap();
    store.finish();

    let store = BlockIndexStore::create(&dir, IndexOptions::default(), Vec::new()).unwrap();
    assert!(!dir.join(SUMMARY_FILE).exists());
    assert_eq!(fs::metadata(dir.join(POSITIONS_FILE)).unwrap().len(), 0);
    store.finish();

    let index = BlockIndex::open(&dir).unwrap();
    assert!(index.is_empty());
    assert!(index.summary().is_empty());
    fs::remove_dir_all(&dir).ok();
}

// ---------------------------------------------------------------------------
// Write failures
// ---------------------------------------------------------------------------

/// `positions.jsonl` points at `/dev/full`, so every write fails with ENOSPC.
#[cfg(target_os = "linux")]
#[test]
fn failed_writes_are_lost_not_persisted() {
    if !Path::new("/dev/full").exists() {
        return;
    }
    let dir = scratch("full_disk");
    fs::create_dir_all(&dir).unwrap();
    std::os::unix::fs::symlink("/dev/full", dir.join(POSITIONS_FILE)).unwrap();

    let options = IndexOptions {
        cap: 10,
        batch_size: 1,
    };
    let store = BlockIndexStore::create(&dir, options, types(&["minecraft:diamond_ore"])).unwrap();

    match store.observe(&ore(0)) {
        Err(IndexError::Persistence { durable, lost, .. }) => assert_eq!((durable, lost), (0, 1)),
        other => panic!("expected a persistence error, got {other:?}"),
    }
    match store.observe(&ore(1)) {
        Err(IndexError::Persistence { lost, .. }) => assert_eq!(lost, 2),
        other => panic!("expected a persistence error, got {other:?}"),
    }
    // Lost rows are neither queryable nor counted as persisted.
    assert!(store.query(&Pattern::new("*"), None).is_empty());
    let live = store.summary();
    assert_eq!((live[0].total, live[0].persisted), (2, 0));

    let summary = store.finish();
    assert!(!summary.is_complete());
    assert_eq!(summary.durable_rows, 0);
    assert_eq!(summary.lost.len(), 2);
    assert_eq!(summary.get("minecraft:diamond_ore").unwrap().persisted, 0);

    // Reading /dev/full never ends; swap in an empty file before reopening.
    fs::remove_file(dir.join(POSITIONS_FILE)).unwrap();
    fs::write(dir.join(POSITIONS_FILE), "").unwrap();
    let index = BlockIndex::open(&dir).unwrap();
    assert!(!index.is_complete());
    assert!(index.is_empty());
    assert_eq!(index.lost(), summary.lost.as_slice());
    assert_eq!(index.get("minecraft:diamond_ore").unwrap().persisted, 0);
    fs::remove_dir_all(&dir).ok();
}
