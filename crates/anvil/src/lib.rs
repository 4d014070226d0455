//! Anvil (`.mca`) world access for the block finder, plus the scan wiring used
//! by the `blockscan` binary.

pub mod config;
pub mod nbt;
pub mod registry;
pub mod world;

use anyhow::{Context, Result};

use blockscan_engine::index::BlockIndexStore;
use blockscan_engine::pipeline::{self, ScanSummary};
use blockscan_engine::scan::{CancelToken, ScanOptions, Scanner};

pub use config::PipelineConfig;
pub use world::{AnvilRegion, AnvilWorld, parse_dimension};

/// Run one scan as configured. Blocks until the scan finishes or `cancel`
/// trips.
///
/// Configuration is validated before the index directory is touched.
pub fn run_scan(config: &PipelineConfig, cancel: CancelToken) -> Result<ScanSummary> {
    config.validate()?;
    let targets = config.targets()?;
    let world = AnvilWorld::open(&config.world)?;

    let options = ScanOptions::new(targets.clone())
        .with_dimensions(config.dimensions())
        .with_workers(config.workers)
        .with_cancel(cancel);
    let scanner = Scanner::new(world, options)?;

    let store = match &config.index {
        Some(dir) => Some(
            BlockIndexStore::create(dir, config.index_options(), targets.sorted())
                .with_context(|| format!("creating index in {}", dir.display()))?,
        ),
        None => None,
    };

    Ok(pipeline::run(&scanner, store, config.structures))
}
