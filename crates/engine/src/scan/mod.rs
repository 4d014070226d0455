//! The position scanner: containers -> chunks -> sub-volumes -> positions.
//!
//! Containers are independent, so they are the unit of parallelism. Each
//! worker streams one container at a time through [`ContainerMatches`]; the
//! pool size bounds how many containers are open at once.

pub mod container;
pub mod stats;
pub mod stream;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, DecodeError};
use crate::source::{ContainerRef, WorldSource};
use crate::target::TargetSet;
use crate::world::position::{BlockPos, ContainerPos, Dimension, WorldAddress};

pub use container::ContainerMatches;
pub use stats::{ScanReport, ScanStats};
pub use stream::MatchStream;

/// One target block found at one position. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMatch {
    pub address: WorldAddress,
    pub block: Arc<str>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    /// Container the match was read from.
    pub container: ContainerPos,
}

impl BlockMatch {
    pub fn pos(&self) -> BlockPos {
        self.address.pos
    }

    pub fn dimension(&self) -> &Dimension {
        &self.address.dimension
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// Cooperative cancellation shared between the caller and scan workers.
///
/// Checked before each container is opened: containers in flight finish,
/// no new ones start. A scan stops itself (sink error, dropped stream)
/// through a [`child`](Self::child) token, so the caller's token is only
/// ever tripped by the caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    parent: Option<Arc<CancelToken>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that is cancelled whenever this one is, and can also be
    /// cancelled on its own.
    pub fn child(&self) -> CancelToken {
        CancelToken {
            flag: Arc::default(),
            parent: Some(Arc::new(self.clone())),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed) || self.parent.as_ref().is_some_and(|p| p.is_cancelled())
    }
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Dimensions to scan. Empty means every dimension the source reports.
    pub dimensions: Vec<Dimension>,
    pub targets: TargetSet,
    /// Worker threads; 0 lets rayon pick (one per core).
    pub workers: usize,
    pub cancel: CancelToken,
}

impl ScanOptions {
    pub fn new(targets: TargetSet) -> Self {
        Self {
            dimensions: Vec::new(),
            targets,
            workers: 0,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_dimensions(mut self, dimensions: impl IntoIterator<Item = Dimension>) -> Self {
        self.dimensions = dimensions.into_iter().collect();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// What a scan produced: totals, plus the first error a sink returned (which
/// also stopped the scan).
#[derive(Debug)]
pub struct ScanOutcome<E> {
    pub report: ScanReport,
    pub sink_error: Option<E>,
}

pub struct Scanner<S> {
    source: S,
    options: ScanOptions,
    pool: rayon::ThreadPool,
}

impl<S: WorldSource> Scanner<S> {
    /// Validate options against the source. Nothing is opened yet.
    pub fn new(source: S, mut options: ScanOptions) -> Result<Self, ConfigError> {
        if options.targets.is_empty() {
            return Err(ConfigError::EmptyTargets);
        }

        let known = source.dimensions();
        if options.dimensions.is_empty() {
            options.dimensions = known;
        } else if let Some(unknown) = options.dimensions.iter().find(|d| !known.contains(d)) {
            return Err(ConfigError::UnknownDimension(unknown.to_string()));
        }
        options.dimensions.sort();
        options.dimensions.dedup();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.workers)
            .thread_name(|i| format!("blockscan-{i}"))
            .build()
            .map_err(|e| ConfigError::Invalid {
                name: "workers",
                reason: e.to_string(),
            })?;

        Ok(Self { source, options, pool })
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.options.cancel.clone()
    }

    /// Scan every configured dimension, handing each match to `sink` from
    /// whichever worker found it.
    ///
    /// Order is guaranteed only within a chunk. A sink error stops this scan
    /// and is returned in the outcome; the report is always produced. The
    /// scanner can be run again afterwards.
    pub fn for_each_match<F, E>(&self, sink: F) -> ScanOutcome<E>
    where
        F: Fn(BlockMatch) -> Result<(), E> + Sync,
        E: Send,
    {
        let start = Instant::now();
        let cancel = self.options.cancel.child();
        let stats = ScanStats::new();
        let first_error: Mutex<Option<E>> = Mutex::new(None);

        tracing::info!(
            "Scanning {} dimension(s) for {} block type(s)",
            self.options.dimensions.len(),
            self.options.targets.len(),
        );

        for dimension in &self.options.dimensions {
            if cancel.is_cancelled() {
                break;
            }

            let containers = match self.source.list_containers(dimension) {
                Ok(containers) => containers,
                Err(err) => {
                    stats.container_failed();
                    tracing::warn!("Cannot list containers of {}: {}", dimension, err);
                    continue;
                }
            };
            tracing::info!("{}: {} containers", dimension, containers.len());

            self.pool.install(|| {
                containers.par_iter().for_each(|container| {
                    if cancel.is_cancelled() {
                        return;
                    }
                    self.scan_container(container, &stats, &cancel, &sink, &first_error);
                });
            });
        }

        let sink_error = first_error.into_inner().unwrap_or_else(PoisonError::into_inner);
        let report = stats.snapshot(start.elapsed(), cancel.is_cancelled());
        tracing::info!(
            "Scan finished: {} matches, {} containers, {}/{} sub-volumes skipped by palette, {} units unreadable ({:.2?})",
            report.matches,
            report.containers_scanned,
            report.sections_filtered,
            report.sections_examined,
            report.skipped_units(),
            start.elapsed(),
        );
        ScanOutcome { report, sink_error }
    }

    /// Collect every match into a vector, sorted by address.
    pub fn collect(&self) -> (Vec<BlockMatch>, ScanReport) {
        let found = Mutex::new(Vec::new());
        let outcome = self.for_each_match(|m| {
            found.lock().unwrap_or_else(PoisonError::into_inner).push(m);
            Ok::<(), std::convert::Infallible>(())
        });
        let mut found = found.into_inner().unwrap_or_else(PoisonError::into_inner);
        found.sort_by(|a, b| a.address.cmp(&b.address));
        (found, outcome.report)
    }

    fn scan_container<F, E>(
        &self,
        container: &ContainerRef,
        stats: &ScanStats,
        cancel: &CancelToken,
        sink: &F,
        first_error: &Mutex<Option<E>>,
    ) where
        F: Fn(BlockMatch) -> Result<(), E> + Sync,
    {
        if !container.pos.is_addressable() {
            stats.container_failed();
            let err = DecodeError::corrupt(container.pos.to_string(), "container coordinates out of range");
            tracing::warn!("Skipping container {} of {}: {}", container.pos, container.dimension, err);
            return;
        }
        let handle = match self.source.open_container(container) {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                stats.container_absent();
                return;
            }
            Err(err) => {
                stats.container_failed();
                tracing::warn!("Skipping container {} of {}: {}", container.pos, container.dimension, err);
                return;
            }
        };
        stats.container_scanned();
        tracing::debug!("Scanning container {} of {}", container.pos, container.dimension);

        for found in ContainerMatches::new(handle, container, &self.options.targets, stats) {
            if let Err(err) = sink(found) {
                let mut slot = first_error.lock().unwrap_or_else(PoisonError::into_inner);
                if slot.is_none() {
                    *slot = Some(err);
                }
                cancel.cancel();
                return;
            }
        }
    }
}
